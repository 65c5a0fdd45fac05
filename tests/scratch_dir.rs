use quack_convert::scratch::ScratchDir;
use std::collections::HashSet;

#[test]
fn removed_on_drop() {
    let root = tempfile::tempdir().unwrap();
    let path = {
        let dir = ScratchDir::create(root.path(), "qc-").unwrap();
        std::fs::write(dir.join("input.docx"), b"x").unwrap();
        std::fs::create_dir(dir.join("profile")).unwrap();
        std::fs::write(dir.join("profile").join("lock"), b"x").unwrap();
        assert!(dir.path().is_dir());
        dir.path().to_path_buf()
    };
    assert!(!path.exists());
}

#[test]
fn removed_when_error_propagates() {
    fn stage_and_fail(root: &std::path::Path) -> anyhow::Result<std::path::PathBuf> {
        let dir = ScratchDir::create(root, "qc-")?;
        std::fs::write(dir.join("input.txt"), b"x")?;
        let p = dir.path().to_path_buf();
        anyhow::ensure!(p.as_os_str().is_empty(), "forced failure at {}", p.display());
        Ok(p)
    }

    let root = tempfile::tempdir().unwrap();
    assert!(stage_and_fail(root.path()).is_err());
    assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
}

#[test]
fn kept_dirs_survive_drop() {
    let root = tempfile::tempdir().unwrap();
    let path = {
        let mut dir = ScratchDir::create(root.path(), "qc-").unwrap();
        dir.keep();
        dir.path().to_path_buf()
    };
    assert!(path.is_dir());
}

#[test]
fn names_carry_prefix_and_never_collide() {
    let root = tempfile::tempdir().unwrap();
    let dirs: Vec<ScratchDir> = (0..50)
        .map(|_| ScratchDir::create(root.path(), "qc-").unwrap())
        .collect();
    let names: HashSet<String> = dirs
        .iter()
        .map(|d| d.path().file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 50);
    assert!(names.iter().all(|n| n.starts_with("qc-")));
}

#[test]
fn entries_are_sorted_and_typed() {
    let root = tempfile::tempdir().unwrap();
    let dir = ScratchDir::create(root.path(), "qc-").unwrap();
    std::fs::write(dir.join("b.pdf"), b"x").unwrap();
    std::fs::write(dir.join("a.docx"), b"x").unwrap();
    std::fs::create_dir(dir.join("c.pdf")).unwrap();

    let entries = dir.entries().unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a.docx", "b.pdf", "c.pdf"]);
    assert!(entries[1].is_file);
    assert!(!entries[2].is_file);
}
