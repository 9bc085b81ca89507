//! Chains of Parquet files joined with a friend chain.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use approx::assert_relative_eq;
use arrow::array::{ArrayRef, Float32Array, Int64Array};
use mp_table::{Chain, CompiledExpr, EventStore, JoinedView, ParquetStore, Table, TableError};

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("mvaprep_table_{}_{}_{}", std::process::id(), nanos, name));
    std::fs::create_dir_all(&p).unwrap();
    p
}

fn write(store: &ParquetStore, path: &PathBuf, name: &str, cols: Vec<(&str, ArrayRef)>) {
    let t = Table::from_columns(name, cols.into_iter().map(|(n, a)| (n.to_string(), a))).unwrap();
    store.write(path, &t).unwrap();
}

#[test]
fn chained_friend_resolves_qualified_columns() {
    let dir = tmp_dir("friend");
    let store = ParquetStore::default();
    let files = [dir.join("a.parquet"), dir.join("b.parquet")];
    let friends = [dir.join("nn_a.parquet"), dir.join("nn_b.parquet")];

    write(
        &store,
        &files[0],
        "ntuple",
        vec![
            ("event", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
            ("pt_1", Arc::new(Float32Array::from(vec![10.0, 20.0, 30.0])) as ArrayRef),
        ],
    );
    write(
        &store,
        &files[1],
        "ntuple",
        vec![
            ("event", Arc::new(Int64Array::from(vec![4, 5])) as ArrayRef),
            ("pt_1", Arc::new(Float32Array::from(vec![40.0, 50.0])) as ArrayRef),
        ],
    );
    write(
        &store,
        &friends[0],
        "ntuple",
        vec![("score", Arc::new(Float32Array::from(vec![0.1, 0.9, 0.8])) as ArrayRef)],
    );
    write(
        &store,
        &friends[1],
        "ntuple",
        vec![("score", Arc::new(Float32Array::from(vec![0.2, 0.7])) as ArrayRef)],
    );

    let mut chain = Chain::new("ntuple");
    chain.add_file(&files[0]).add_file(&files[1]);
    let mut friend_chain = Chain::new("ntuple");
    friend_chain.add_file(&friends[0]).add_file(&friends[1]);
    assert_eq!(chain.count(&store).unwrap(), 5);

    let base = chain.load(&store).unwrap();
    let nn = friend_chain.load(&store).unwrap();
    let view = JoinedView::new(&base).with_friend(Some("nn"), &nn).unwrap();

    let expr = CompiledExpr::compile("pt_1 * nn.score").unwrap();
    let values = view.evaluate(&expr).unwrap();
    let expected = [1.0, 18.0, 24.0, 8.0, 35.0];
    for (v, e) in values.iter().zip(expected) {
        assert_relative_eq!(*v, e, epsilon = 1e-4);
    }

    let sel = CompiledExpr::compile("nn.score > 0.5 && event % 2 == 1").unwrap();
    let mask = view.mask(&sel).unwrap();
    assert_eq!(mask, vec![false, false, true, false, true]);
    let skimmed = base.filter(&mask).unwrap();
    assert_eq!(skimmed.column_i64("event").unwrap(), vec![3, 5]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn friend_of_different_length_is_rejected() {
    let dir = tmp_dir("mismatch");
    let store = ParquetStore::default();
    let base_path = dir.join("base.parquet");
    let nn_path = dir.join("nn.parquet");
    write(
        &store,
        &base_path,
        "ntuple",
        vec![("x", Arc::new(Float32Array::from(vec![1.0, 2.0, 3.0])) as ArrayRef)],
    );
    write(
        &store,
        &nn_path,
        "ntuple",
        vec![("y", Arc::new(Float32Array::from(vec![1.0, 2.0])) as ArrayRef)],
    );

    let base = store.read(&base_path, "ntuple").unwrap();
    let nn = store.read(&nn_path, "ntuple").unwrap();
    let err = JoinedView::new(&base).with_friend(Some("nn"), &nn).unwrap_err();
    assert!(matches!(err, TableError::FriendLengthMismatch { expected: 3, actual: 2, .. }));

    let _ = std::fs::remove_dir_all(&dir);
}
