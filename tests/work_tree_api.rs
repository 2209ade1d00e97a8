//! Integration tests for the `WorkTree` API.
//!
//! Each test drives two or more replicas over a shared in-memory provider
//! and exchanges operations by hand.

mod common;

use std::path::{Path, PathBuf};

use common::{
    Recorder, all_entries, at, change, deliver, join, oid, provider, start, text_of, unwrap_ops,
};
use tandem::{
    EntriesOptions, EntryStatus, FileId, FileType, Lamport, LocalTimestamp, OpPayload, Operation,
    ReplicaId, TreeError, Version,
};
use tandem_base::CommitSnapshot;

fn summary(entries: &[tandem::Entry]) -> Vec<(String, usize, EntryStatus, bool)> {
    entries
        .iter()
        .map(|e| {
            (
                e.path.display().to_string(),
                e.depth,
                e.status,
                e.visible,
            )
        })
        .collect()
}

#[tokio::test]
async fn status_after_concurrent_edit_and_create() {
    let p = provider([(
        oid(0),
        CommitSnapshot::new()
            .dir("a")
            .dir("a/b")
            .text("a/b/c", "oid0 base text"),
    )]);
    let (mut t1, start_ops) = start(1, oid(0), &p).await;
    let mut t2 = join(2, &start_ops, &p).await;

    let b1 = t1.open_text_file(Path::new("a/b/c")).await.unwrap();
    let edit = unwrap_ops([t1.edit(b1, &[at(0, 0)..at(0, 0)], "x").unwrap()]);
    let create = unwrap_ops([t2.create_file(Path::new("a/b/x"), FileType::Text).unwrap()]);

    deliver(&mut t1, &create).await;
    deliver(&mut t2, &edit).await;

    let options = EntriesOptions::all()
        .show_deleted(true)
        .descend_into(["a", "a/b"]);
    let entries = t1.entries(&options);
    assert_eq!(entries, t2.entries(&options));
    assert_eq!(
        summary(&entries),
        vec![
            ("a".to_owned(), 1, EntryStatus::Unchanged, true),
            ("a/b".to_owned(), 2, EntryStatus::Unchanged, true),
            ("a/b/c".to_owned(), 3, EntryStatus::Modified, true),
            ("a/b/x".to_owned(), 3, EntryStatus::New, true),
        ]
    );
}

#[tokio::test]
async fn descend_into_limits_expansion() {
    let p = provider([(
        oid(0),
        CommitSnapshot::new().text("a/b/c", "").text("d/e", ""),
    )]);
    let (t, _) = start(1, oid(0), &p).await;

    let top = t.entries(&EntriesOptions::all().descend_into(Vec::<PathBuf>::new()));
    let names: Vec<_> = top.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a", "d"]);

    let some = t.entries(&EntriesOptions::all().descend_into(["d"]));
    let paths: Vec<_> = some.iter().map(|e| e.path.clone()).collect();
    assert_eq!(
        paths,
        [PathBuf::from("a"), PathBuf::from("d"), PathBuf::from("d/e")]
    );
}

#[tokio::test]
async fn rename_edit_remove_statuses() {
    let p = provider([(
        oid(0),
        CommitSnapshot::new()
            .text("d/f", "one")
            .text("g", "two")
            .text("h", "three"),
    )]);
    let (mut t, _) = start(1, oid(0), &p).await;

    t.rename(Path::new("d/f"), Path::new("f2")).unwrap();

    let g = t.open_text_file(Path::new("g")).await.unwrap();
    t.edit(g, &[at(0, 3)..at(0, 3)], "!").unwrap();

    let h = t.open_text_file(Path::new("h")).await.unwrap();
    t.rename(Path::new("h"), Path::new("d/h2")).unwrap();
    t.edit(h, &[at(0, 0)..at(0, 5)], "3").unwrap();
    assert_eq!(t.path(h).unwrap(), Some(PathBuf::from("d/h2")));

    t.create_file(Path::new("n"), FileType::Text).unwrap();
    t.remove(Path::new("d")).unwrap();
    assert_eq!(t.path(h).unwrap(), None);
    assert_eq!(t.text(h).unwrap(), "3");

    assert_eq!(
        summary(&all_entries(&t)),
        vec![
            ("d".to_owned(), 1, EntryStatus::Removed, false),
            ("d/h2".to_owned(), 2, EntryStatus::RenamedAndModified, false),
            ("f2".to_owned(), 1, EntryStatus::Renamed, true),
            ("g".to_owned(), 1, EntryStatus::Modified, true),
            ("n".to_owned(), 1, EntryStatus::New, true),
        ]
    );
    let visible: Vec<_> = t
        .entries(&EntriesOptions::all())
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(visible, ["f2", "g", "n"]);
    assert!(!t.exists(Path::new("d/h2")));
}

#[tokio::test]
async fn removed_new_files_are_not_listed() {
    let p = provider([(oid(0), CommitSnapshot::new())]);
    let (mut t, _) = start(1, oid(0), &p).await;
    t.create_file(Path::new("tmp"), FileType::Text).unwrap();
    t.remove(Path::new("tmp")).unwrap();
    assert!(all_entries(&t).is_empty());
    assert!(matches!(
        t.file_id(Path::new("tmp")),
        Err(TreeError::UnknownPath { .. })
    ));
}

#[tokio::test]
async fn rebase_preserves_local_edits() {
    let p = provider([
        (oid(0), CommitSnapshot::new().text("a", "oid0 base text")),
        (oid(1), CommitSnapshot::new().text("a", "oid1 base text")),
    ]);
    let (mut t1, mut log) = start(1, oid(0), &p).await;
    let mut t2 = join(2, &log, &p).await;

    let b1 = t1.open_text_file(Path::new("a")).await.unwrap();
    let edit = unwrap_ops([t1
        .edit(b1, &[at(0, 4)..at(0, 5), at(0, 9)..at(0, 10)], "-")
        .unwrap()]);
    assert_eq!(t1.text(b1).unwrap(), "oid0-base-text");
    log.extend(edit.clone());

    let b2 = t2.open_text_file(Path::new("a")).await.unwrap();
    let rec2 = Recorder::attach(&mut t2, b2);
    deliver(&mut t2, &edit).await;
    assert_eq!(t2.text(b2).unwrap(), "oid0-base-text");
    assert_eq!(
        rec2.batches(),
        vec![vec![change((0, 4), (0, 5), "-"), change((0, 9), (0, 10), "-")]]
    );

    let rec1 = Recorder::attach(&mut t1, b1);
    let reset = unwrap_ops(t1.reset(Some(oid(1))).await.unwrap());
    assert_eq!(reset.len(), 1);
    assert_eq!(t1.head(), Some(oid(1)));
    assert_eq!(t1.text(b1).unwrap(), "oid1-base-text");
    assert_eq!(rec1.batches(), vec![vec![change((0, 3), (0, 4), "1")]]);
    log.extend(reset.clone());

    deliver(&mut t2, &reset).await;
    assert_eq!(t2.head(), Some(oid(1)));
    assert_eq!(t2.text(b2).unwrap(), "oid1-base-text");
    assert_eq!(rec2.batches()[1], vec![change((0, 3), (0, 4), "1")]);

    // A replica joining later replays the same history.
    let mut t3 = join(3, &log, &p).await;
    assert_eq!(text_of(&mut t3, "a").await, "oid1-base-text");
    assert_eq!(all_entries(&t3), all_entries(&t1));
}

#[tokio::test]
async fn concurrent_resets_converge_on_greatest_epoch() {
    let p = provider([
        (oid(0), CommitSnapshot::new().text("f", "base")),
        (oid(1), CommitSnapshot::new().text("f", "one")),
        (oid(2), CommitSnapshot::new().text("f", "two")),
    ]);
    let (mut t1, log) = start(1, oid(0), &p).await;
    let mut t2 = join(2, &log, &p).await;
    let b1 = t1.open_text_file(Path::new("f")).await.unwrap();
    let b2 = t2.open_text_file(Path::new("f")).await.unwrap();

    let r1 = unwrap_ops(t1.reset(Some(oid(1))).await.unwrap());
    let r2 = unwrap_ops(t2.reset(Some(oid(2))).await.unwrap());
    deliver(&mut t1, &r2).await;
    deliver(&mut t2, &r1).await;

    assert_eq!(t1.current_epoch(), t2.current_epoch());
    assert_eq!(t1.head(), Some(oid(2)));
    assert_eq!(t2.head(), Some(oid(2)));
    assert_eq!(t1.text(b1).unwrap(), "two");
    assert_eq!(t2.text(b2).unwrap(), "two");
}

#[tokio::test]
async fn upstream_removal_keeps_locally_edited_files() {
    let p = provider([
        (
            oid(0),
            CommitSnapshot::new()
                .text("keep", "k")
                .text("gone", "x")
                .text("edited", "y"),
        ),
        (oid(1), CommitSnapshot::new().text("keep", "k")),
    ]);
    let (mut t, _) = start(1, oid(0), &p).await;
    let b = t.open_text_file(Path::new("edited")).await.unwrap();
    t.edit(b, &[at(0, 1)..at(0, 1)], "!").unwrap();

    t.reset(Some(oid(1))).await.unwrap();
    assert!(!t.exists(Path::new("gone")));
    assert!(t.exists(Path::new("edited")));
    assert_eq!(t.text(b).unwrap(), "!");

    let statuses: Vec<_> = all_entries(&t)
        .into_iter()
        .map(|e| (e.name, e.status))
        .collect();
    assert_eq!(
        statuses,
        [
            ("edited".to_owned(), EntryStatus::New),
            ("keep".to_owned(), EntryStatus::Unchanged),
        ]
    );
}

#[tokio::test]
async fn remote_edits_notify_until_disposed() {
    let p = provider([(oid(0), CommitSnapshot::new().text("f", "abc"))]);
    let (mut t1, log) = start(1, oid(0), &p).await;
    let mut t2 = join(2, &log, &p).await;

    let b2 = t2.open_text_file(Path::new("f")).await.unwrap();
    let rec = Recorder::attach(&mut t2, b2);
    let b1 = t1.open_text_file(Path::new("f")).await.unwrap();

    let first = unwrap_ops([t1.edit(b1, &[at(0, 3)..at(0, 3)], "d").unwrap()]);
    deliver(&mut t2, &first).await;
    assert_eq!(rec.batches(), vec![vec![change((0, 3), (0, 3), "d")]]);

    t2.dispose_buffer(b2).unwrap();
    let second = unwrap_ops([t1.edit(b1, &[at(0, 0)..at(0, 1)], "A").unwrap()]);
    deliver(&mut t2, &second).await;
    assert_eq!(rec.batches().len(), 1, "disposed buffers stay silent");
    assert_eq!(t2.text(b2), Err(TreeError::BufferDisposed(b2)));
    assert!(matches!(
        t2.on_change(b2, |_| {}),
        Err(TreeError::BufferDisposed(_))
    ));

    // History received while closed is replayed on reopen.
    assert_eq!(text_of(&mut t2, "f").await, "Abcd");
}

#[tokio::test]
async fn changes_since_composes_intermediate_edits() {
    let p = provider([(oid(0), CommitSnapshot::new().text("f", "abc"))]);
    let (mut t, _) = start(1, oid(0), &p).await;
    let b = t.open_text_file(Path::new("f")).await.unwrap();
    let v0 = t.version().clone();

    t.edit(b, &[at(0, 0)..at(0, 0)], "12").unwrap();
    t.edit(b, &[at(0, 4)..at(0, 5)], "").unwrap();
    assert_eq!(t.text(b).unwrap(), "12ab");

    assert_eq!(
        t.changes_since(b, &v0).unwrap(),
        vec![change((0, 0), (0, 0), "12"), change((0, 4), (0, 5), "")]
    );
    assert!(t.changes_since(b, t.version()).unwrap().is_empty());
}

#[tokio::test]
async fn changes_since_spans_a_reset() {
    let p = provider([
        (oid(0), CommitSnapshot::new().text("f", "line\n")),
        (oid(1), CommitSnapshot::new().text("f", "line\nmore\n")),
    ]);
    let (mut t, _) = start(1, oid(0), &p).await;
    let b = t.open_text_file(Path::new("f")).await.unwrap();
    let v0 = t.version().clone();
    t.reset(Some(oid(1))).await.unwrap();
    assert_eq!(
        t.changes_since(b, &v0).unwrap(),
        vec![change((1, 0), (1, 0), "more\n")]
    );
}

#[tokio::test]
async fn deferred_operations_wait_for_dependencies() {
    let p = provider([(oid(0), CommitSnapshot::new())]);
    let (mut t1, log) = start(1, oid(0), &p).await;
    let mut t2 = join(2, &log, &p).await;

    let dir = unwrap_ops([t1.create_file(Path::new("d"), FileType::Directory).unwrap()]);
    let file = unwrap_ops([t1.create_file(Path::new("d/f"), FileType::Text).unwrap()]);

    assert!(deliver(&mut t2, &file).await.is_empty());
    assert_eq!(t2.deferred_operation_count(), 1);
    assert!(!t2.exists(Path::new("d")));
    assert!(!t2.has_observed(t1.version()));

    deliver(&mut t2, &dir).await;
    assert_eq!(t2.deferred_operation_count(), 0);
    assert!(t2.exists(Path::new("d/f")));
    assert!(t2.has_observed(t1.version()));
}

#[tokio::test]
async fn reapplying_observed_operations_is_a_no_op() {
    let p = provider([(oid(0), CommitSnapshot::new().text("f", "abc"))]);
    let (mut t1, log) = start(1, oid(0), &p).await;
    let mut t2 = join(2, &log, &p).await;
    let b2 = t2.open_text_file(Path::new("f")).await.unwrap();
    let rec = Recorder::attach(&mut t2, b2);

    let b1 = t1.open_text_file(Path::new("f")).await.unwrap();
    let mut ops = unwrap_ops([t1.edit(b1, &[at(0, 1)..at(0, 2)], "B").unwrap()]);
    ops.extend(unwrap_ops([
        t1.create_file(Path::new("g"), FileType::Text).unwrap()
    ]));

    deliver(&mut t2, &ops).await;
    let entries = all_entries(&t2);
    let version = t2.version().clone();

    deliver(&mut t2, &ops).await;
    deliver(&mut t2, &log).await;
    assert_eq!(all_entries(&t2), entries);
    assert_eq!(t2.version(), &version);
    assert_eq!(t2.text(b2).unwrap(), "aBc");
    assert_eq!(rec.batches().len(), 1);
}

#[tokio::test]
async fn unknown_file_reference_rejects_the_batch() {
    let p = provider([(oid(0), CommitSnapshot::new())]);
    let (mut t1, log) = start(1, oid(0), &p).await;
    let mut t2 = join(2, &log, &p).await;

    let good = unwrap_ops([t1.create_file(Path::new("z"), FileType::Text).unwrap()]);
    let ghost = FileId::New(LocalTimestamp::new(ReplicaId::new(8), 1));
    let stranger = ReplicaId::new(9);
    let bad = Operation {
        id: LocalTimestamp::new(stranger, 1),
        lamport: Lamport::new(100, stranger),
        epoch: t2.current_epoch().unwrap(),
        deps: Version::new(),
        payload: OpPayload::Remove { file: ghost },
    };
    let mut batch = good.clone();
    batch.push(bad);

    let err = t2.apply_ops(batch).await.unwrap_err();
    assert_eq!(err, TreeError::UnknownFileId { file_id: ghost });
    assert!(!t2.exists(Path::new("z")));
    assert_eq!(t2.version().get(stranger), 0);

    deliver(&mut t2, &good).await;
    assert!(t2.exists(Path::new("z")));
}

#[tokio::test]
async fn parked_operation_that_fails_later_is_dropped() {
    let p = provider([(oid(0), CommitSnapshot::new())]);
    let (mut t1, log) = start(1, oid(0), &p).await;
    let mut t2 = join(2, &log, &p).await;

    let good = unwrap_ops([t2.create_file(Path::new("z"), FileType::Text).unwrap()]);
    let sender = ReplicaId::new(2);
    let ghost = FileId::New(LocalTimestamp::new(ReplicaId::new(8), 1));
    let bad = Operation {
        id: LocalTimestamp::new(sender, 2),
        lamport: Lamport::new(100, sender),
        epoch: t1.current_epoch().unwrap(),
        deps: Version::new(),
        payload: OpPayload::Remove { file: ghost },
    };

    // Parked behind 2.1; nothing can tell yet that it is bad.
    assert!(deliver(&mut t1, &[bad]).await.is_empty());
    assert_eq!(t1.deferred_operation_count(), 1);

    deliver(&mut t1, &good).await;
    assert!(t1.exists(Path::new("z")));
    assert_eq!(t1.deferred_operation_count(), 0);
    assert_eq!(t1.version().get(sender), 1);

    // The sender keeps making progress.
    let next = unwrap_ops([t2.create_file(Path::new("y"), FileType::Text).unwrap()]);
    deliver(&mut t1, &next).await;
    assert!(t1.exists(Path::new("y")));
    assert_eq!(all_entries(&t1), all_entries(&t2));
}

#[tokio::test]
async fn remote_names_must_be_single_components() {
    let p = provider([(oid(0), CommitSnapshot::new())]);
    let (mut t1, log) = start(1, oid(0), &p).await;
    let mut t2 = join(2, &log, &p).await;
    let sender = ReplicaId::new(2);

    for (seq, name) in [(1, "a/b"), (2, ""), (3, "..")] {
        let create = Operation {
            id: LocalTimestamp::new(sender, 1),
            lamport: Lamport::new(seq, sender),
            epoch: t1.current_epoch().unwrap(),
            deps: Version::new(),
            payload: OpPayload::CreateFile {
                parent: FileId::Root,
                name: name.to_owned(),
                file_type: FileType::Text,
            },
        };
        assert!(
            matches!(
                t1.apply_ops(vec![create]).await,
                Err(TreeError::MalformedOperation { .. })
            ),
            "{name:?}"
        );
    }
    assert!(all_entries(&t1).is_empty());
    assert_eq!(t1.version().get(sender), 0);

    let good = unwrap_ops([t2.create_file(Path::new("b"), FileType::Text).unwrap()]);
    deliver(&mut t1, &good).await;
    assert!(t1.exists(Path::new("b")));
}

#[tokio::test]
async fn concurrent_creates_at_same_path_both_survive() {
    let p = provider([(oid(0), CommitSnapshot::new())]);
    let (mut t1, log) = start(1, oid(0), &p).await;
    let mut t2 = join(2, &log, &p).await;

    let c1 = unwrap_ops([t1.create_file(Path::new("new.txt"), FileType::Text).unwrap()]);
    let c2 = unwrap_ops([t2.create_file(Path::new("new.txt"), FileType::Text).unwrap()]);
    deliver(&mut t1, &c2).await;
    deliver(&mut t2, &c1).await;

    let entries = all_entries(&t1);
    assert_eq!(entries, all_entries(&t2));
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.name == "new.txt" && e.visible));
    assert!(entries.iter().all(|e| e.status == EntryStatus::New));
    assert_eq!(entries[0].file_id, FileId::New(c1[0].id));
    assert_eq!(entries[1].file_id, FileId::New(c2[0].id));
    assert_eq!(
        t2.file_id(Path::new("new.txt")).unwrap(),
        FileId::New(c1[0].id)
    );
}

#[tokio::test]
async fn concurrent_moves_into_each_other_emit_fixups() {
    let p = provider([(oid(0), CommitSnapshot::new().dir("a").dir("b"))]);
    let (mut t1, log) = start(1, oid(0), &p).await;
    let mut t2 = join(2, &log, &p).await;

    let m1 = unwrap_ops([t1.rename(Path::new("a"), Path::new("b/a")).unwrap()]);
    let m2 = unwrap_ops([t2.rename(Path::new("b"), Path::new("a/b")).unwrap()]);

    let f1 = deliver(&mut t1, &m2).await;
    let f2 = deliver(&mut t2, &m1).await;
    assert_eq!(f1.len(), 1);
    assert_eq!(f2.len(), 1);
    assert!(matches!(
        &f1[0].payload,
        OpPayload::Move { parent: FileId::Root, name, .. } if name == "b"
    ));

    assert!(deliver(&mut t1, &f2).await.is_empty());
    assert!(deliver(&mut t2, &f1).await.is_empty());
    assert_eq!(all_entries(&t1), all_entries(&t2));
    assert!(t1.exists(Path::new("b/a")));
    assert!(t2.exists(Path::new("b")));
    assert!(!t2.exists(Path::new("a")));
}

#[tokio::test]
async fn anchors_follow_their_character() {
    let p = provider([(oid(0), CommitSnapshot::new().text("f", "hello world"))]);
    let (mut t1, log) = start(1, oid(0), &p).await;
    let mut t2 = join(2, &log, &p).await;
    let b1 = t1.open_text_file(Path::new("f")).await.unwrap();
    let b2 = t2.open_text_file(Path::new("f")).await.unwrap();

    let before_w = t1.anchor_after(b1, at(0, 6)).unwrap();
    let after_o = t1.anchor_before(b1, at(0, 5)).unwrap();
    let start_anchor = t1.anchor_before(b1, at(0, 0)).unwrap();

    let insert = unwrap_ops([t2.edit(b2, &[at(0, 0)..at(0, 0)], "XYZ ").unwrap()]);
    deliver(&mut t1, &insert).await;
    assert_eq!(t1.resolve_anchor(b1, &before_w).unwrap(), at(0, 10));
    assert_eq!(t1.resolve_anchor(b1, &after_o).unwrap(), at(0, 9));
    assert_eq!(t1.resolve_anchor(b1, &start_anchor).unwrap(), at(0, 0));

    // Deleting the anchored character leaves the anchor where it was.
    t1.edit(b1, &[at(0, 10)..at(0, 15)], "").unwrap();
    assert_eq!(t1.text(b1).unwrap(), "XYZ hello ");
    assert_eq!(t1.resolve_anchor(b1, &before_w).unwrap(), at(0, 10));

    assert!(matches!(
        t1.anchor_after(b1, at(3, 0)),
        Err(TreeError::InvalidRange { .. })
    ));
}

#[tokio::test]
async fn anchors_from_other_files_are_rejected() {
    let p = provider([(
        oid(0),
        CommitSnapshot::new().text("f", "one").text("g", "two"),
    )]);
    let (mut t, _) = start(1, oid(0), &p).await;
    let f = t.open_text_file(Path::new("f")).await.unwrap();
    let g = t.open_text_file(Path::new("g")).await.unwrap();
    t.edit(g, &[at(0, 0)..at(0, 0)], "new ").unwrap();
    let foreign = t.anchor_after(g, at(0, 1)).unwrap();
    assert_eq!(
        t.resolve_anchor(f, &foreign),
        Err(TreeError::UnknownAnchor(f))
    );
}

#[tokio::test]
async fn wire_form_round_trips_and_rejects_garbage() {
    let p = provider([(oid(0), CommitSnapshot::new().text("f", "abc"))]);
    let (mut t, log) = start(1, oid(0), &p).await;
    let b = t.open_text_file(Path::new("f")).await.unwrap();
    let edit = t.edit(b, &[at(0, 0)..at(0, 3)], "xyz").unwrap();

    for op in log.iter().chain([&edit.operation]) {
        let wire = op.to_wire().unwrap();
        assert_eq!(&Operation::from_wire(&wire).unwrap(), op);
    }
    assert!(matches!(
        Operation::from_wire("{not json"),
        Err(TreeError::MalformedOperation { .. })
    ));
    assert_eq!(edit.epoch_head, Some(oid(0)));
    assert_eq!(edit.epoch_replica_id(), ReplicaId::new(1));
}

#[tokio::test]
async fn empty_head_is_a_valid_epoch() {
    let p = provider([(oid(0), CommitSnapshot::new())]);
    let mut t = join(2, &[], &p).await;
    assert_eq!(t.head(), None);
    assert!(t.current_epoch().is_some());
    t.create_file(Path::new("x"), FileType::Text).unwrap();
    assert!(t.exists(Path::new("x")));
}

#[tokio::test]
async fn mutations_before_an_epoch_fail() {
    let p = provider([(oid(0), CommitSnapshot::new())]);
    let (mut t1, _) = start(1, oid(0), &p).await;
    let later = unwrap_ops([t1.create_file(Path::new("x"), FileType::Text).unwrap()]);

    // Joining from an operation whose epoch never arrived leaves no epoch.
    let mut t2 = join(2, &later, &p).await;
    assert_eq!(t2.deferred_operation_count(), 1);
    assert_eq!(t2.current_epoch(), None);
    assert_eq!(
        t2.create_file(Path::new("y"), FileType::Text),
        Err(TreeError::NotInitialized)
    );
}
