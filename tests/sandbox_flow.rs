//! Library-level tests for sandbox allocation.
//!
//! Exercises the branching strategies directly: fresh worktrees at HEAD,
//! snapshot commits for pending source changes, and reuse of an existing
//! branch tip.

use em::io::config::ProjectConfig;
use em::io::layout::ProjectLayout;
use em::sandbox::create_sandbox;
use em::test_support::{TestRepo, run_git};

fn setup(repo: &TestRepo) -> (ProjectLayout, ProjectConfig) {
    repo.init_project().expect("init project");
    (ProjectLayout::new(repo.path()), ProjectConfig::default())
}

#[test]
fn clean_tree_gets_worktree_at_head() {
    let repo = TestRepo::new().expect("repo");
    let (layout, config) = setup(&repo);
    let git = repo.git();
    let head = git.head_commit().expect("head");

    let dir = create_sandbox(&layout, &config, &git, "alpha", None, None).expect("sandbox");

    assert_eq!(git.branch_tip("alpha").expect("tip"), head);
    assert!(dir.join("main.py").exists());
    assert!(dir.join("run").is_dir());
    assert!(dir.join("data").exists());
    // Allocation leaves the main checkout where it was.
    assert_eq!(git.head_commit().expect("head"), head);
}

#[test]
fn pending_source_changes_become_a_snapshot_commit() {
    let repo = TestRepo::new().expect("repo");
    let (layout, config) = setup(&repo);
    let git = repo.git();
    let head = git.head_commit().expect("head");
    repo.write_file("main.py", "print(\"edited\")\n").expect("edit");

    let dir =
        create_sandbox(&layout, &config, &git, "beta", None, Some("try edit")).expect("sandbox");

    // One new commit on top of the old head, capturing the edit.
    let tip = git.branch_tip("beta").expect("tip");
    assert_ne!(tip, head);
    assert_eq!(git.rev_parse("beta^").expect("parent"), head);
    let contents = std::fs::read_to_string(dir.join("main.py")).expect("read");
    assert_eq!(contents, "print(\"edited\")\n");

    // The edit stays pending in the main working tree.
    let pending = std::fs::read_to_string(repo.path().join("main.py")).expect("read");
    assert_eq!(pending, "print(\"edited\")\n");
    assert_eq!(git.head_commit().expect("head"), head);
}

#[test]
fn snapshot_commit_message_defaults_when_no_description() {
    let repo = TestRepo::new().expect("repo");
    let (layout, config) = setup(&repo);
    let git = repo.git();
    repo.write_file("main.py", "print(\"edited\")\n").expect("edit");

    create_sandbox(&layout, &config, &git, "beta", None, None).expect("sandbox");

    let message = run_git(repo.path(), &["log", "-1", "--format=%s", "beta"]).expect("log");
    assert_eq!(message, "setup experiment");
}

#[test]
fn matching_branch_tip_is_reused_without_a_new_commit() {
    let repo = TestRepo::new().expect("repo");
    let (layout, config) = setup(&repo);
    let git = repo.git();
    let head = git.head_commit().expect("head");
    repo.write_file("main.py", "print(\"edited\")\n").expect("edit");

    let dir = create_sandbox(&layout, &config, &git, "beta", None, None).expect("sandbox");
    let tip = git.branch_tip("beta").expect("tip");

    // Recreate: drop the worktree but keep the branch.
    std::fs::remove_dir_all(&dir).expect("remove worktree");
    git.worktree_prune().expect("prune");

    let dir =
        create_sandbox(&layout, &config, &git, "beta", Some(&tip), None).expect("sandbox again");

    // Same commit, no new snapshot.
    assert_eq!(git.branch_tip("beta").expect("tip"), tip);
    assert!(dir.join("main.py").exists());
    // The relocation dance restored the main checkout and the pending edit.
    assert_eq!(git.head_commit().expect("head"), head);
    let pending = std::fs::read_to_string(repo.path().join("main.py")).expect("read");
    assert_eq!(pending, "print(\"edited\")\n");
    // The stash swept the empty untracked data/ away mid-dance; allocation
    // must bring it back and link it.
    assert!(layout.data_dir.is_dir());
    assert!(dir.join("data").exists());
}

#[test]
fn reuse_at_head_only_recreates_the_branch() {
    let repo = TestRepo::new().expect("repo");
    let (layout, config) = setup(&repo);
    let git = repo.git();
    let head = git.head_commit().expect("head");

    let dir = create_sandbox(&layout, &config, &git, "alpha", None, None).expect("sandbox");
    std::fs::remove_dir_all(&dir).expect("remove worktree");
    git.worktree_prune().expect("prune");

    create_sandbox(&layout, &config, &git, "alpha", Some(&head), None).expect("sandbox again");
    assert_eq!(git.branch_tip("alpha").expect("tip"), head);
}

#[test]
fn diverged_source_changes_refuse_branch_reuse() {
    let repo = TestRepo::new().expect("repo");
    let (layout, config) = setup(&repo);
    let git = repo.git();
    repo.write_file("main.py", "print(\"edited\")\n").expect("edit");

    let dir = create_sandbox(&layout, &config, &git, "beta", None, None).expect("sandbox");
    let tip = git.branch_tip("beta").expect("tip");
    std::fs::remove_dir_all(&dir).expect("remove worktree");
    git.worktree_prune().expect("prune");

    // New source content that the recorded tip does not capture.
    repo.write_file("main.py", "print(\"diverged\")\n").expect("edit");
    let err = create_sandbox(&layout, &config, &git, "beta", Some(&tip), None)
        .expect_err("reuse must be refused");
    assert!(
        err.to_string().contains("not updating existing branch"),
        "{err:#}"
    );
}

#[test]
fn untracked_artifacts_do_not_trigger_snapshots() {
    let repo = TestRepo::new().expect("repo");
    let (layout, config) = setup(&repo);
    let git = repo.git();
    let head = git.head_commit().expect("head");
    repo.write_file("results.csv", "loss,acc\n").expect("write");

    create_sandbox(&layout, &config, &git, "alpha", None, None).expect("sandbox");
    // csv is not a tracked extension, so the branch stays at HEAD.
    assert_eq!(git.branch_tip("alpha").expect("tip"), head);
}
