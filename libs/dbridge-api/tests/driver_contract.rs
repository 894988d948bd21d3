use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use dbridge_api::{
    Adapter, CancellationToken, Column, Driver, DriverError, Envelope, ErrorKind, Header, Meta,
    QueryCursor, Record, Result, SchemaType, Session, Structure, TableOptions, VecCursor,
};

/// Adapter that counts every backend call it receives.
#[derive(Default)]
struct CountingAdapter {
    calls: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    rows: usize,
}

impl CountingAdapter {
    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Adapter for CountingAdapter {
    fn databases(&self) -> Result<Vec<String>> {
        self.hit();
        Ok(vec!["_system".into(), "shop".into()])
    }

    fn columns(&self, database: &str, opts: &TableOptions) -> Result<Vec<Column>> {
        self.hit();
        if database != "shop" {
            return Err(DriverError::backend(format!("database '{database}' not found")));
        }
        Ok(vec![Column::new(format!("{}_id", opts.table), "collection")])
    }

    fn structure(&self) -> Result<Vec<Structure>> {
        self.hit();
        Ok(vec![Structure::schema("shop", vec![Structure::table("orders", "shop")])])
    }

    fn open_cursor(
        &self,
        _database: &str,
        _query: &str,
        _cancel: &CancellationToken,
    ) -> Result<QueryCursor> {
        self.hit();
        let records: Vec<Box<dyn Record>> =
            (0..self.rows).map(|i| Envelope::boxed(json!({"i": i}))).collect();
        Ok(QueryCursor {
            header: Header::new(["Results"]),
            meta: Meta::schema_less(),
            cursor: Box::new(VecCursor::new(records)),
        })
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn connected(rows: usize) -> (Session, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let adapter = CountingAdapter { rows, ..Default::default() };
    let calls = adapter.calls.clone();
    let closes = adapter.closes.clone();
    (Session::connect(Box::new(adapter)), calls, closes)
}

#[test]
fn unconnected_session_rejects_everything() {
    let mut session = Session::new();
    assert!(!session.is_connected());

    assert_eq!(session.list_databases().unwrap_err().kind(), ErrorKind::NotInitialized);
    assert_eq!(session.select_database("shop").unwrap_err().kind(), ErrorKind::NotInitialized);
    assert_eq!(
        session.columns(&TableOptions::new("orders")).unwrap_err().kind(),
        ErrorKind::NotInitialized
    );
    assert_eq!(session.structure().unwrap_err().kind(), ErrorKind::NotInitialized);
    assert_eq!(
        session.query("FOR d IN orders RETURN d", CancellationToken::new()).unwrap_err().kind(),
        ErrorKind::NotInitialized
    );
}

#[test]
fn unselected_session_needs_database_for_columns_and_query() {
    let (session, calls, _) = connected(1);

    assert_eq!(
        session.columns(&TableOptions::new("orders")).unwrap_err().kind(),
        ErrorKind::NoDatabaseSelected
    );
    assert_eq!(
        session.query("anything", CancellationToken::new()).unwrap_err().kind(),
        ErrorKind::NoDatabaseSelected
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0, "no backend call before selection");

    let list = session.list_databases().unwrap();
    assert_eq!(list.current, "");
    assert_eq!(list.available, ["_system", "shop"]);

    let tree = session.structure().unwrap();
    assert_eq!(tree[0].children[0].name, "orders");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn select_database_is_idempotent_and_lazy() {
    let (mut session, calls, _) = connected(0);

    session.select_database("shop").unwrap();
    session.select_database("shop").unwrap();
    assert_eq!(session.current_database(), "shop");
    assert_eq!(calls.load(Ordering::SeqCst), 0, "selection never touches the backend");
    assert_eq!(session.list_databases().unwrap().current, "shop");

    // unknown names are accepted and fail on first use
    session.select_database("missing").unwrap();
    let err = session.columns(&TableOptions::new("orders")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert!(err.to_string().starts_with("failed to fetch columns of 'orders'"));
}

#[test]
fn columns_schema_overrides_selected_database() {
    let (mut session, _, _) = connected(0);
    session.select_database("missing").unwrap();

    let opts = TableOptions::new("orders").with_schema("shop");
    assert_eq!(session.columns(&opts).unwrap(), [Column::new("orders_id", "collection")]);
    assert_eq!(session.current_database(), "missing");
}

#[test]
fn query_returns_stream_with_header_before_rows() {
    let (mut session, _, _) = connected(2);
    session.select_database("shop").unwrap();

    let mut stream = session.query("FOR d IN orders RETURN d", CancellationToken::new()).unwrap();
    assert_eq!(stream.header().names(), ["Results"]);
    assert_eq!(stream.meta().schema_type, SchemaType::SchemaLess);

    let mut count = 0;
    while stream.has_next() {
        stream.next_record().unwrap();
        count += 1;
    }
    assert_eq!(count, 2);
}

#[test]
fn zero_row_query_is_not_an_error() {
    let (mut session, _, _) = connected(0);
    session.select_database("shop").unwrap();

    let mut stream = session.query("FOR d IN empty RETURN d", CancellationToken::new()).unwrap();
    assert!(!stream.has_next());
    assert_eq!(stream.header().names(), ["Results"]);
}

#[test]
fn close_releases_adapter_once() {
    let (mut session, _, closes) = connected(0);
    session.select_database("shop").unwrap();

    session.close();
    session.close();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(session.current_database(), "");
    assert_eq!(session.list_databases().unwrap_err().kind(), ErrorKind::NotInitialized);

    drop(session);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}
