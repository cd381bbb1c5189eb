//! The store survives a restart: everything observable is reloaded from the
//! snapshot file written after the last mutation.

use bulwark_db::{Database, NewOpponentDefense, NewSubmission, StoreError};
use bulwark_types::models::ArchiveReason;

fn submission(user: &str, code: &str) -> NewSubmission {
    NewSubmission {
        user_id: user.into(),
        username: format!("{}-name", user),
        code: code.into(),
        image_data: Some(vec![7; 32]),
        image_filename: Some("defense.png".into()),
        ..Default::default()
    }
}

#[test]
fn reload_restores_pending_archive_and_counter() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("submissions.db");

    let (pending_before, archived_before, counter_before) = {
        let db = Database::open(&path).unwrap();
        let a = db.insert_submission(&submission("u1", "A")).unwrap();
        let b = db.insert_submission(&submission("u2", "B")).unwrap();
        db.insert_submission(&submission("u1", "C")).unwrap();
        db.update_message(a, Some("hello"), Some("u9")).unwrap();
        db.delete_to_archive(b, ArchiveReason::Deleted).unwrap();
        db.mark_published(a).unwrap();

        let opp = db
            .insert_opponent_defense(&NewOpponentDefense {
                user_id: "u3".into(),
                username: "carol".into(),
                image_data: vec![1, 2, 3],
                image_filename: None,
            })
            .unwrap();
        let n = db.next_opponent_number().unwrap();
        db.approve_opponent_defense(opp, &[4, 5, 6], n).unwrap();
        // issued but never used
        db.next_opponent_number().unwrap();

        (
            db.list_pending().unwrap(),
            db.list_archived().unwrap(),
            db.current_opponent_number().unwrap(),
        )
    };

    assert!(path.exists());

    let reopened = Database::open(&path).unwrap();
    assert_eq!(reopened.list_pending().unwrap(), pending_before);
    assert_eq!(reopened.list_archived().unwrap(), archived_before);
    assert_eq!(reopened.current_opponent_number().unwrap(), counter_before);
    assert_eq!(reopened.next_opponent_number().unwrap(), counter_before + 1);
    assert_eq!(reopened.list_approved_opponent_defenses().unwrap().len(), 1);
}

#[test]
fn failed_mutation_leaves_snapshot_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    let db = Database::open(&path).unwrap();
    db.insert_submission(&submission("u1", "A")).unwrap();
    let before = std::fs::read(&path).unwrap();

    assert!(matches!(
        db.update_code(999, "B").unwrap_err(),
        StoreError::NotFound { .. }
    ));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn corrupt_snapshot_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    std::fs::write(&path, b"definitely not sqlite").unwrap();

    match Database::open(&path) {
        Err(err) => assert!(err.is_storage()),
        Ok(_) => panic!("corrupt snapshot loaded"),
    }
}

#[test]
fn unwritable_snapshot_rolls_the_mutation_back() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let path = data.join("store.db");

    let db = Database::open(&path).unwrap();
    let id = db.insert_submission(&submission("u1", "A")).unwrap();

    // A file where the snapshot directory used to be.
    std::fs::remove_dir_all(&data).unwrap();
    std::fs::write(&data, b"not a directory").unwrap();

    let err = db.mark_published(id).unwrap_err();
    assert!(err.is_storage());
    assert_eq!(db.list_pending().unwrap().len(), 1);
    assert!(!db.get_submission(id).unwrap().unwrap().published);
    assert!(db.list_archived().unwrap().is_empty());

    assert!(db.insert_submission(&submission("u2", "B")).unwrap_err().is_storage());
    assert_eq!(db.list_pending().unwrap().len(), 1);

    std::fs::remove_file(&data).unwrap();
    std::fs::create_dir(&data).unwrap();
    db.insert_submission(&submission("u3", "C")).unwrap();

    let reopened = Database::open(&path).unwrap();
    let codes: Vec<_> = reopened
        .list_pending()
        .unwrap()
        .into_iter()
        .map(|s| s.code)
        .collect();
    assert_eq!(codes, ["A", "C"]);
}
