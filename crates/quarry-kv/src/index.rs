//! Secondary indexes over the transactional KV layer.
//!
//! An index is a stateless descriptor: a name, a byte prefix and a unique
//! flag. Its entries live under `encode_bytes("<section>_<name>")`. The
//! byte encoding is mandatory, since raw prefixes `p_c` and `p_c1` would
//! alias under a prefix scan whenever a value under `c` begins with `'1'`.
//!
//! Layouts:
//!
//! - non-unique: key `prefix ‖ encode_value(col₁…colₙ, row_id)`, placeholder
//!   value
//! - unique, no NULLs: key `prefix ‖ encode_value(col₁…colₙ)`, value
//!   `encode_int(row_id)`
//! - unique with any NULL indexed value: degrades to the non-unique layout.
//!   A UNIQUE index permits multiple NULL values for columns that can
//!   contain NULL (MySQL semantics).

use quarry_codec::{decode_int, decode_value, encode_int, encode_value, Datum};
use quarry_common::error::{QuarryError, QuarryResult};
use quarry_common::types::{Key, RowId, Value};

use crate::txn::{Transaction, TxnIterator};

/// Value stored under non-unique (and NULL-degraded unique) entries.
const PLACEHOLDER: &[u8] = &[0x00];

/// A secondary index descriptor.
#[derive(Debug, Clone)]
pub struct Index {
    name: String,
    prefix: Vec<u8>,
    unique: bool,
}

impl Index {
    /// Creates an index descriptor under a table's index section prefix.
    #[must_use]
    pub fn new(section_prefix: &str, name: &str, unique: bool) -> Self {
        let qualified = format!("{section_prefix}_{name}");
        Self {
            name: name.to_string(),
            prefix: quarry_codec::encoded_bytes(qualified.as_bytes()),
            unique,
        }
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this index enforces uniqueness.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Returns the byte prefix all entries of this index share.
    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn uses_row_id_in_key(&self, values: &[Datum]) -> bool {
        !self.unique || values.iter().any(Datum::is_null)
    }

    fn index_key(&self, values: &[Datum], row_id: RowId) -> Key {
        let mut buf = self.prefix.clone();
        if self.uses_row_id_in_key(values) {
            let mut with_handle = values.to_vec();
            with_handle.push(Datum::I64(row_id.value()));
            buf.extend_from_slice(&encode_value(&with_handle));
        } else {
            buf.extend_from_slice(&encode_value(values));
        }
        Key::from_vec(buf)
    }

    /// Creates an entry for `(values, row_id)`.
    ///
    /// For a unique index with no NULL indexed value, fails with the
    /// duplicate-key kind if a live entry already exists at the same values.
    pub fn create(
        &self,
        txn: &mut Transaction,
        values: &[Datum],
        row_id: RowId,
    ) -> QuarryResult<()> {
        let key = self.index_key(values, row_id);
        if self.uses_row_id_in_key(values) {
            return txn.set(key, Value::from_bytes(PLACEHOLDER));
        }

        match txn.get(&key) {
            Err(err) if err.is_not_found() => {
                let mut handle = Vec::with_capacity(8);
                encode_int(&mut handle, row_id.value());
                txn.set(key, Value::from_vec(handle))
            }
            Err(err) => Err(err),
            Ok(_) => Err(QuarryError::KeyExists {
                key: format!("{}{:?}", self.name, values),
            }),
        }
    }

    /// Removes the entry for `(values, row_id)`.
    pub fn delete(
        &self,
        txn: &mut Transaction,
        values: &[Datum],
        row_id: RowId,
    ) -> QuarryResult<()> {
        txn.delete(self.index_key(values, row_id))
    }

    /// Positions an iterator at `values`.
    ///
    /// `hit` is true iff the entry at the cursor equals the sought key
    /// exactly (the unique-lookup fast path).
    pub fn seek(
        &self,
        txn: &Transaction,
        values: &[Datum],
    ) -> QuarryResult<(IndexIterator, bool)> {
        let seek_key = self.index_key(values, RowId::new(0));
        let mut iter = IndexIterator {
            iter: txn.seek(&seek_key)?,
            prefix: self.prefix.clone(),
            unique: self.unique,
            peeked: None,
        };
        let hit = match iter.peek()? {
            Some((key, _)) => key == &seek_key,
            None => false,
        };
        Ok((iter, hit))
    }

    /// Positions an iterator at the first entry of the index.
    pub fn seek_first(&self, txn: &Transaction) -> QuarryResult<IndexIterator> {
        Ok(IndexIterator {
            iter: txn.seek(&Key::from_vec(self.prefix.clone()))?,
            prefix: self.prefix.clone(),
            unique: self.unique,
            peeked: None,
        })
    }

    /// Deletes every entry of this index.
    pub fn drop(&self, txn: &mut Transaction) -> QuarryResult<()> {
        let mut doomed = Vec::new();
        let mut iter = txn.seek(&Key::from_vec(self.prefix.clone()))?;
        while let Some((key, _)) = iter.next()? {
            if !key.starts_with(&self.prefix) {
                break;
            }
            doomed.push(key);
        }
        drop(iter);
        for key in doomed {
            txn.delete(key)?;
        }
        Ok(())
    }
}

/// An iterator over one index's entries, in encoded-value order.
pub struct IndexIterator {
    iter: TxnIterator,
    prefix: Vec<u8>,
    unique: bool,
    peeked: Option<(Key, Value)>,
}

impl IndexIterator {
    fn peek(&mut self) -> QuarryResult<Option<&(Key, Value)>> {
        if self.peeked.is_none() {
            self.peeked = self.iter.next()?;
        }
        Ok(self.peeked.as_ref())
    }

    /// Returns the next entry's indexed values and row id, or None once the
    /// cursor leaves the index prefix.
    pub fn next(&mut self) -> QuarryResult<Option<(Vec<Datum>, RowId)>> {
        let entry = match self.peeked.take() {
            Some(entry) => Some(entry),
            None => self.iter.next()?,
        };
        let Some((key, value)) = entry else {
            return Ok(None);
        };
        if !key.starts_with(&self.prefix) {
            return Ok(None);
        }

        let mut values = decode_value(&key.as_bytes()[self.prefix.len()..])?;
        // NULL-degraded unique entries carry the placeholder value and the
        // row id as the last key element, like non-unique entries.
        let row_id_in_key = !self.unique || value.as_bytes() == PLACEHOLDER;
        if row_id_in_key {
            match values.pop() {
                Some(Datum::I64(handle)) => Ok(Some((values, RowId::new(handle)))),
                _ => Err(QuarryError::corrupted("index entry missing row id")),
            }
        } else {
            let (handle, _) = decode_int(value.as_bytes())?;
            Ok(Some((values, RowId::new(handle))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn setup() -> (Store, Transaction) {
        let store = Store::in_memory();
        let txn = store.begin().unwrap();
        (store, txn)
    }

    #[test]
    fn test_unique_rejects_duplicates() {
        let (_store, mut txn) = setup();
        let index = Index::new("t_1_i", "name", true);
        let values = [Datum::str("a")];

        index.create(&mut txn, &values, RowId::new(1)).unwrap();
        let err = index.create(&mut txn, &values, RowId::new(2)).unwrap_err();
        assert!(err.is_duplicate_key());

        // A different value is free.
        index
            .create(&mut txn, &[Datum::str("b")], RowId::new(2))
            .unwrap();
    }

    #[test]
    fn test_unique_delete_frees_slot() {
        let (store, mut txn) = setup();
        let index = Index::new("t_1_i", "name", true);
        let values = [Datum::str("a")];

        index.create(&mut txn, &values, RowId::new(1)).unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin().unwrap();
        index.delete(&mut txn, &values, RowId::new(1)).unwrap();
        index.create(&mut txn, &values, RowId::new(2)).unwrap();
        txn.commit().unwrap();

        let txn = store.begin().unwrap();
        let (mut iter, hit) = index.seek(&txn, &values).unwrap();
        assert!(hit);
        let (_, row_id) = iter.next().unwrap().unwrap();
        assert_eq!(row_id, RowId::new(2));
    }

    #[test]
    fn test_unique_with_null_permits_duplicates() {
        let (_store, mut txn) = setup();
        let index = Index::new("t_1_i", "name", true);
        let values = [Datum::Null];

        index.create(&mut txn, &values, RowId::new(1)).unwrap();
        index.create(&mut txn, &values, RowId::new(2)).unwrap();

        let mut iter = index.seek_first(&txn).unwrap();
        let mut handles = Vec::new();
        while let Some((values, row_id)) = iter.next().unwrap() {
            assert!(values[0].is_null());
            handles.push(row_id.value());
        }
        assert_eq!(handles, vec![1, 2]);
    }

    #[test]
    fn test_non_unique_iterates_in_value_order() {
        let (_store, mut txn) = setup();
        let index = Index::new("t_1_i", "age", false);
        index
            .create(&mut txn, &[Datum::I64(30)], RowId::new(1))
            .unwrap();
        index
            .create(&mut txn, &[Datum::I64(10)], RowId::new(2))
            .unwrap();
        index
            .create(&mut txn, &[Datum::I64(20)], RowId::new(3))
            .unwrap();

        let mut iter = index.seek_first(&txn).unwrap();
        let mut seen = Vec::new();
        while let Some((values, row_id)) = iter.next().unwrap() {
            seen.push((values[0].to_i64().unwrap(), row_id.value()));
        }
        assert_eq!(seen, vec![(10, 2), (20, 3), (30, 1)]);
    }

    #[test]
    fn test_prefix_does_not_alias_sibling_index() {
        // Indexes "c" and "c1" under the same section must never cross.
        let (_store, mut txn) = setup();
        let c = Index::new("p", "c", false);
        let c1 = Index::new("p", "c1", false);

        c.create(&mut txn, &[Datum::str("1zzz")], RowId::new(1)).unwrap();
        c1.create(&mut txn, &[Datum::str("aaa")], RowId::new(2)).unwrap();

        let mut iter = c.seek_first(&txn).unwrap();
        let mut count = 0;
        while let Some((_, row_id)) = iter.next().unwrap() {
            assert_eq!(row_id, RowId::new(1));
            count += 1;
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn test_seek_hit_and_miss() {
        let (_store, mut txn) = setup();
        let index = Index::new("t_1_i", "name", true);
        index
            .create(&mut txn, &[Datum::str("b")], RowId::new(1))
            .unwrap();

        let (_, hit) = index.seek(&txn, &[Datum::str("b")]).unwrap();
        assert!(hit);

        let (mut iter, hit) = index.seek(&txn, &[Datum::str("a")]).unwrap();
        assert!(!hit);
        // The miss still positions at the next entry in order.
        let (values, _) = iter.next().unwrap().unwrap();
        assert_eq!(values[0], Datum::str("b"));
    }

    #[test]
    fn test_drop_removes_all_entries() {
        let (store, mut txn) = setup();
        let index = Index::new("t_1_i", "age", false);
        let other = Index::new("t_1_i", "name", false);
        for i in 0..5 {
            index
                .create(&mut txn, &[Datum::I64(i)], RowId::new(i))
                .unwrap();
        }
        other
            .create(&mut txn, &[Datum::str("keep")], RowId::new(9))
            .unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin().unwrap();
        index.drop(&mut txn).unwrap();
        txn.commit().unwrap();

        let txn = store.begin().unwrap();
        let mut iter = index.seek_first(&txn).unwrap();
        assert!(iter.next().unwrap().is_none());
        // The sibling index survives.
        let mut iter = other.seek_first(&txn).unwrap();
        assert!(iter.next().unwrap().is_some());
    }
}
