//! End-to-end SELECT execution tests against an in-memory store.

use std::sync::Arc;

use quarry_codec::Datum;
use quarry_common::error::QuarryError;
use quarry_common::types::TableId;
use quarry_kv::store::Store;
use quarry_sql::plan::ExecutionContext;
use quarry_sql::storage::{Catalog, TableInfo};
use quarry_sql::{
    AggFunc, BinaryOp, BuiltinFunc, Expr, JoinType, OrderByItem, Planner, Recordset, SelectField,
    SelectLock, SelectStmt, SessionVars, TableRef,
};

struct Fixture {
    store: Store,
    catalog: Arc<Catalog>,
}

impl Fixture {
    /// A store with table `t(id int, name varchar)` holding
    /// (1,"a") (2,"b") (3,"c") (20,"x") (21,"y").
    fn new() -> Self {
        let store = Store::in_memory();
        let catalog = Arc::new(Catalog::new());
        let table = catalog.register(TableInfo::new(TableId::new(1), "t", &["id", "name"]));

        let mut txn = store.begin().unwrap();
        for (id, name) in [(1, "a"), (2, "b"), (3, "c"), (20, "x"), (21, "y")] {
            table
                .add_record(&mut txn, &[Datum::I64(id), Datum::str(name)])
                .unwrap();
        }
        txn.commit().unwrap();

        Self { store, catalog }
    }

    fn context(&self) -> ExecutionContext {
        ExecutionContext::new(self.store.begin().unwrap(), SessionVars::new())
    }

    fn run(&self, stmt: &SelectStmt) -> Vec<Vec<Datum>> {
        self.run_with(self.context(), stmt)
    }

    fn run_with(&self, ctx: ExecutionContext, stmt: &SelectStmt) -> Vec<Vec<Datum>> {
        let planner = Planner::new(self.catalog.clone());
        let plan = planner.plan_select(&ctx, stmt).unwrap();
        Recordset::new(ctx, plan).collect().unwrap()
    }
}

fn select_id_from_t() -> SelectStmt {
    SelectStmt {
        fields: vec![SelectField::new(Expr::ident("id"))],
        from: Some(TableRef::table("t")),
        ..SelectStmt::new()
    }
}

fn first_ints(rows: &[Vec<Datum>]) -> Vec<i64> {
    rows.iter().map(|row| row[0].to_i64().unwrap()).collect()
}

#[test]
fn test_where_filter() {
    let fx = Fixture::new();
    let mut stmt = select_id_from_t();
    stmt.where_clause = Some(Expr::binary(
        Expr::ident("id"),
        BinaryOp::Ge,
        Expr::value(20i64),
    ));
    let rows = fx.run(&stmt);
    assert_eq!(first_ints(&rows), vec![20, 21]);
}

#[test]
fn test_having_without_group_by() {
    let fx = Fixture::new();
    let mut stmt = select_id_from_t();
    stmt.having = Some(Expr::binary(
        Expr::ident("id"),
        BinaryOp::Ge,
        Expr::value(20i64),
    ));
    let rows = fx.run(&stmt);
    assert_eq!(rows.len(), 2);
    assert_eq!(first_ints(&rows), vec![20, 21]);
}

#[test]
fn test_count_star() {
    let fx = Fixture::new();
    let stmt = SelectStmt {
        fields: vec![SelectField::new(Expr::count_star())],
        from: Some(TableRef::table("t")),
        ..SelectStmt::new()
    };
    let rows = fx.run(&stmt);
    assert_eq!(rows, vec![vec![Datum::I64(5)]]);
}

#[test]
fn test_count_star_empty_table() {
    let fx = Fixture::new();
    fx.catalog
        .register(TableInfo::new(TableId::new(9), "e", &["id"]));
    let stmt = SelectStmt {
        fields: vec![SelectField::new(Expr::count_star())],
        from: Some(TableRef::table("e")),
        ..SelectStmt::new()
    };
    let rows = fx.run(&stmt);
    assert_eq!(rows, vec![vec![Datum::I64(0)]]);
}

#[test]
fn test_order_by_hidden_column_desc_limit() {
    // SELECT id FROM t ORDER BY name DESC LIMIT 2: "name" is not in the
    // select fields and rides along as a hidden projection.
    let fx = Fixture::new();
    let mut stmt = select_id_from_t();
    stmt.order_by = vec![OrderByItem::desc(Expr::ident("name"))];
    stmt.limit = Some(2);
    let rows = fx.run(&stmt);
    assert_eq!(first_ints(&rows), vec![21, 20]);
    // The hidden field is trimmed from the output.
    assert!(rows.iter().all(|row| row.len() == 1));
}

#[test]
fn test_left_join_pads_unmatched() {
    let store = Store::in_memory();
    let catalog = Arc::new(Catalog::new());
    let t1 = catalog.register(TableInfo::new(TableId::new(1), "t1", &["id"]));
    let t2 = catalog.register(TableInfo::new(TableId::new(2), "t2", &["id"]));

    let mut txn = store.begin().unwrap();
    t1.add_record(&mut txn, &[Datum::I64(1)]).unwrap();
    t1.add_record(&mut txn, &[Datum::I64(2)]).unwrap();
    t2.add_record(&mut txn, &[Datum::I64(1)]).unwrap();
    txn.commit().unwrap();

    let stmt = SelectStmt {
        fields: vec![SelectField::new(Expr::ident("*"))],
        from: Some(TableRef::join(
            TableRef::table("t1"),
            TableRef::table("t2"),
            JoinType::Left,
            Some(Expr::binary(
                Expr::ident("t1.id"),
                BinaryOp::Eq,
                Expr::ident("t2.id"),
            )),
        )),
        ..SelectStmt::new()
    };

    let ctx = ExecutionContext::new(store.begin().unwrap(), SessionVars::new());
    let planner = Planner::new(catalog.clone());
    let plan = planner.plan_select(&ctx, &stmt).unwrap();
    let rows = Recordset::new(ctx, plan).collect().unwrap();

    assert_eq!(
        rows,
        vec![
            vec![Datum::I64(1), Datum::I64(1)],
            vec![Datum::I64(2), Datum::Null],
        ]
    );
}

#[test]
fn test_right_join_pads_unmatched() {
    let store = Store::in_memory();
    let catalog = Arc::new(Catalog::new());
    let t1 = catalog.register(TableInfo::new(TableId::new(1), "t1", &["id"]));
    let t2 = catalog.register(TableInfo::new(TableId::new(2), "t2", &["id"]));

    let mut txn = store.begin().unwrap();
    t1.add_record(&mut txn, &[Datum::I64(1)]).unwrap();
    t2.add_record(&mut txn, &[Datum::I64(1)]).unwrap();
    t2.add_record(&mut txn, &[Datum::I64(2)]).unwrap();
    txn.commit().unwrap();

    let stmt = SelectStmt {
        fields: vec![SelectField::new(Expr::ident("*"))],
        from: Some(TableRef::join(
            TableRef::table("t1"),
            TableRef::table("t2"),
            JoinType::Right,
            Some(Expr::binary(
                Expr::ident("t1.id"),
                BinaryOp::Eq,
                Expr::ident("t2.id"),
            )),
        )),
        ..SelectStmt::new()
    };

    let ctx = ExecutionContext::new(store.begin().unwrap(), SessionVars::new());
    let planner = Planner::new(catalog.clone());
    let plan = planner.plan_select(&ctx, &stmt).unwrap();
    let rows = Recordset::new(ctx, plan).collect().unwrap();

    assert_eq!(
        rows,
        vec![
            vec![Datum::I64(1), Datum::I64(1)],
            vec![Datum::Null, Datum::I64(2)],
        ]
    );
}

#[test]
fn test_cross_join_counts_product() {
    let fx = Fixture::new();
    fx.catalog
        .register(TableInfo::new(TableId::new(3), "u", &["k"]));
    let table = fx.catalog.table("u").unwrap();
    let mut txn = fx.store.begin().unwrap();
    table.add_record(&mut txn, &[Datum::I64(100)]).unwrap();
    table.add_record(&mut txn, &[Datum::I64(200)]).unwrap();
    txn.commit().unwrap();

    let stmt = SelectStmt {
        fields: vec![SelectField::new(Expr::count_star())],
        from: Some(TableRef::join(
            TableRef::table("t"),
            TableRef::table("u"),
            JoinType::Cross,
            None,
        )),
        ..SelectStmt::new()
    };
    let rows = fx.run(&stmt);
    assert_eq!(rows, vec![vec![Datum::I64(10)]]);
}

#[test]
fn test_full_join_rejected_at_plan_time() {
    let fx = Fixture::new();
    let stmt = SelectStmt {
        fields: vec![SelectField::new(Expr::ident("*"))],
        from: Some(TableRef::join(
            TableRef::table("t"),
            TableRef::table("t"),
            JoinType::Full,
            None,
        )),
        ..SelectStmt::new()
    };
    let ctx = fx.context();
    let planner = Planner::new(fx.catalog.clone());
    assert!(matches!(
        planner.plan_select(&ctx, &stmt).unwrap_err(),
        QuarryError::UnsupportedJoinType { .. }
    ));
}

#[test]
fn test_snapshot_isolation_across_transactions() {
    let fx = Fixture::new();

    // T1 opens its snapshot first.
    let t1_ctx = fx.context();

    // T2 inserts (99, "z") and commits.
    let table = fx.catalog.table("t").unwrap();
    let mut t2 = fx.store.begin().unwrap();
    table
        .add_record(&mut t2, &[Datum::I64(99), Datum::str("z")])
        .unwrap();
    t2.commit().unwrap();

    // T1 must not see the new row.
    let rows = fx.run_with(t1_ctx, &select_id_from_t());
    assert_eq!(rows.len(), 5);
    assert!(!first_ints(&rows).contains(&99));

    // A fresh T3 scan sees it.
    let rows = fx.run(&select_id_from_t());
    assert_eq!(rows.len(), 6);
    assert!(first_ints(&rows).contains(&99));
}

#[test]
fn test_group_by_with_having() {
    let fx = Fixture::new();
    let table = fx
        .catalog
        .register(TableInfo::new(TableId::new(4), "g", &["id", "name"]));
    let mut txn = fx.store.begin().unwrap();
    for (id, name) in [(1, "a"), (2, "a"), (3, "b")] {
        table
            .add_record(&mut txn, &[Datum::I64(id), Datum::str(name)])
            .unwrap();
    }
    txn.commit().unwrap();

    let stmt = SelectStmt {
        fields: vec![
            SelectField::new(Expr::ident("name")),
            SelectField::new(Expr::count_star()),
        ],
        from: Some(TableRef::table("g")),
        group_by: vec![Expr::ident("name")],
        ..SelectStmt::new()
    };
    let rows = fx.run(&stmt);
    assert_eq!(
        rows,
        vec![
            vec![Datum::str("a"), Datum::I64(2)],
            vec![Datum::str("b"), Datum::I64(1)],
        ]
    );

    // HAVING over a hoisted aggregate keeps only the bigger group.
    let stmt = SelectStmt {
        fields: vec![SelectField::new(Expr::ident("name"))],
        from: Some(TableRef::table("g")),
        group_by: vec![Expr::ident("name")],
        having: Some(Expr::binary(
            Expr::count_star(),
            BinaryOp::Gt,
            Expr::value(1i64),
        )),
        ..SelectStmt::new()
    };
    let rows = fx.run(&stmt);
    assert_eq!(rows, vec![vec![Datum::str("a")]]);
}

#[test]
fn test_group_by_aggregates() {
    let fx = Fixture::new();
    let stmt = SelectStmt {
        fields: vec![
            SelectField::new(Expr::agg(AggFunc::Sum, vec![Expr::ident("id")])),
            SelectField::new(Expr::agg(AggFunc::Min, vec![Expr::ident("id")])),
            SelectField::new(Expr::agg(AggFunc::Max, vec![Expr::ident("id")])),
            SelectField::new(Expr::agg(AggFunc::Avg, vec![Expr::ident("id")])),
        ],
        from: Some(TableRef::table("t")),
        ..SelectStmt::new()
    };
    let rows = fx.run(&stmt);
    assert_eq!(
        rows,
        vec![vec![
            Datum::I64(47),
            Datum::I64(1),
            Datum::I64(21),
            Datum::F64(9.4),
        ]]
    );
}

#[test]
fn test_distinct_preserves_first_arrival() {
    let fx = Fixture::new();
    let table = fx
        .catalog
        .register(TableInfo::new(TableId::new(5), "d", &["v"]));
    let mut txn = fx.store.begin().unwrap();
    for v in [3, 1, 3, 2, 1] {
        table.add_record(&mut txn, &[Datum::I64(v)]).unwrap();
    }
    txn.commit().unwrap();

    let stmt = SelectStmt {
        distinct: true,
        fields: vec![SelectField::new(Expr::ident("v"))],
        from: Some(TableRef::table("d")),
        ..SelectStmt::new()
    };
    let rows = fx.run(&stmt);
    assert_eq!(first_ints(&rows), vec![3, 1, 2]);
}

#[test]
fn test_offset_and_limit() {
    let fx = Fixture::new();
    let mut stmt = select_id_from_t();
    stmt.order_by = vec![OrderByItem::asc(Expr::ident("id"))];
    stmt.offset = Some(1);
    stmt.limit = Some(2);
    let rows = fx.run(&stmt);
    assert_eq!(first_ints(&rows), vec![2, 3]);
}

#[test]
fn test_select_without_from() {
    let fx = Fixture::new();
    let stmt = SelectStmt {
        fields: vec![SelectField::new(Expr::binary(
            Expr::value(2i64),
            BinaryOp::Mul,
            Expr::value(21i64),
        ))],
        from: None,
        ..SelectStmt::new()
    };
    let rows = fx.run(&stmt);
    assert_eq!(rows, vec![vec![Datum::I64(42)]]);
}

#[test]
fn test_database_builtin_through_pipeline() {
    let fx = Fixture::new();
    let mut session = SessionVars::new();
    session.current_schema = Some("app".to_string());
    let ctx = ExecutionContext::new(fx.store.begin().unwrap(), session);

    let stmt = SelectStmt {
        fields: vec![SelectField::new(Expr::builtin(BuiltinFunc::Database))],
        from: None,
        ..SelectStmt::new()
    };
    let rows = fx.run_with(ctx, &stmt);
    assert_eq!(rows, vec![vec![Datum::str("app")]]);
}

#[test]
fn test_found_rows_updated_after_select() {
    let fx = Fixture::new();
    let ctx = fx.context();
    let session = ctx.session.clone();
    fx.run_with(ctx, &select_id_from_t());
    assert_eq!(session.lock().found_rows, 5);
}

#[test]
fn test_for_update_is_noop_under_autocommit() {
    let fx = Fixture::new();
    let ctx = fx.context();
    let txn = ctx.txn.clone();

    let mut stmt = select_id_from_t();
    stmt.lock = SelectLock::ForUpdate;
    fx.run_with(ctx, &stmt);

    assert!(txn.lock().locked_keys().is_empty());
}

#[test]
fn test_for_update_locks_rows_in_transaction() {
    let fx = Fixture::new();
    let mut session = SessionVars::new();
    session.in_transaction = true;
    let ctx = ExecutionContext::new(fx.store.begin().unwrap(), session);
    let txn = ctx.txn.clone();

    let mut stmt = select_id_from_t();
    stmt.where_clause = Some(Expr::binary(
        Expr::ident("id"),
        BinaryOp::Ge,
        Expr::value(20i64),
    ));
    stmt.lock = SelectLock::ForUpdate;
    fx.run_with(ctx, &stmt);

    assert_eq!(txn.lock().locked_keys().len(), 2);
}

#[test]
fn test_cancellation_stops_execution() {
    let fx = Fixture::new();
    let ctx = fx.context();
    let planner = Planner::new(fx.catalog.clone());
    let plan = planner.plan_select(&ctx, &select_id_from_t()).unwrap();

    ctx.cancel();
    let mut recordset = Recordset::new(ctx, plan);
    assert!(matches!(
        recordset.next().unwrap_err(),
        QuarryError::Cancelled
    ));
    recordset.close();
}

#[test]
fn test_unknown_column_rejected_at_plan_time() {
    let fx = Fixture::new();
    let stmt = SelectStmt {
        fields: vec![SelectField::new(Expr::ident("ghost"))],
        from: Some(TableRef::table("t")),
        ..SelectStmt::new()
    };
    let ctx = fx.context();
    let planner = Planner::new(fx.catalog.clone());
    assert!(matches!(
        planner.plan_select(&ctx, &stmt).unwrap_err(),
        QuarryError::UnknownColumn { .. }
    ));
}

#[test]
fn test_explain_names_phases() {
    let fx = Fixture::new();
    let mut stmt = select_id_from_t();
    stmt.where_clause = Some(Expr::binary(
        Expr::ident("id"),
        BinaryOp::Ge,
        Expr::value(20i64),
    ));
    stmt.order_by = vec![OrderByItem::desc(Expr::ident("name"))];
    stmt.limit = Some(2);

    let ctx = fx.context();
    let planner = Planner::new(fx.catalog.clone());
    let plan = planner.plan_select(&ctx, &stmt).unwrap();
    let explain = plan.explain();

    let expected_order = [
        "Final",
        "Limit",
        "Order",
        "SelectFields",
        "Lock",
        "Filter",
        "RowStackFrom",
        "TableScan",
    ];
    let mut last = 0;
    for name in expected_order {
        let pos = explain[last..]
            .find(name)
            .unwrap_or_else(|| panic!("{name} missing from:\n{explain}"));
        last += pos;
    }
    assert!(explain.contains("table=t"));
}

#[test]
fn test_wildcard_expansion() {
    let fx = Fixture::new();
    let stmt = SelectStmt {
        fields: vec![SelectField::new(Expr::ident("*"))],
        from: Some(TableRef::table("t")),
        ..SelectStmt::new()
    };
    let ctx = fx.context();
    let planner = Planner::new(fx.catalog.clone());
    let plan = planner.plan_select(&ctx, &stmt).unwrap();

    let fields: Vec<&str> = plan.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(fields, vec!["id", "name"]);

    let rows = Recordset::new(ctx, plan).collect().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0], vec![Datum::I64(1), Datum::str("a")]);
}
