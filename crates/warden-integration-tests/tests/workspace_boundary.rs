//! Path boundary properties against a real directory tree.

use warden_workspace::{Access, PathBoundary};

fn tree() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    std::fs::create_dir_all(root.join("project/src")).unwrap();
    std::fs::create_dir_all(root.join("project-evil")).unwrap();
    std::fs::create_dir_all(root.join("projects")).unwrap();
    (dir, root)
}

#[test]
fn test_grant_covers_dir_and_descendants_only() {
    let (_dir, root) = tree();
    let project = root.join("project");
    let boundary = PathBoundary::new(&root);
    assert!(boundary.grant_read(&project));

    assert!(boundary.is_read_allowed(&project));
    assert!(boundary.is_read_allowed(project.join("src")));
    assert!(boundary.is_read_allowed(project.join("src/not-yet-created.rs")));

    assert!(!boundary.is_read_allowed(root.join("project-evil")));
    assert!(!boundary.is_read_allowed(root.join("projects")));
    assert!(!boundary.is_read_allowed(&root));
    assert!(!boundary.is_write_allowed(&project));
}

#[test]
fn test_traversal_out_of_grant_is_denied() {
    let (_dir, root) = tree();
    let project = root.join("project");
    let boundary = PathBoundary::new(&project);
    boundary.grant_write(&project);

    assert!(!boundary.is_write_allowed(project.join("../project-evil/x.txt")));
    assert!(!boundary.is_write_allowed("../project-evil/x.txt"));
    assert!(boundary.is_write_allowed("src/../src/lib.rs"));
}

#[cfg(unix)]
#[test]
fn test_symlink_escape_is_denied() {
    let (_dir, root) = tree();
    let project = root.join("project");
    std::os::unix::fs::symlink(root.join("project-evil"), project.join("link")).unwrap();
    let boundary = PathBoundary::new(&project);
    boundary.grant_read(&project);

    assert!(!boundary.is_read_allowed(project.join("link/secret.txt")));
}

#[test]
fn test_parent_grant_prunes_children() {
    let (_dir, root) = tree();
    let boundary = PathBoundary::new(&root);

    assert!(boundary.grant_read(root.join("project/src")));
    assert!(boundary.grant_read(root.join("projects")));
    assert!(boundary.grant_read(&root));
    let expected = vec![boundary.normalize(&root)];
    assert_eq!(boundary.roots(Access::Read), expected);

    // Already covered.
    assert!(!boundary.grant_read(root.join("project")));
    assert_eq!(boundary.roots(Access::Read), expected);
}
