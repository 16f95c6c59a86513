use std::fs;

use taskdesk::editors::EditorKind;

#[test]
fn extends_and_imports_merge_with_local_keys_winning() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(
        tmp.path().join("base.toml"),
        r#"
[api]
base_url = "https://tasks.example.org/api/v2/"
timeout_secs = 10

[user]
locale = "fr"
"#,
    )
    .unwrap();
    fs::create_dir_all(tmp.path().join("parts")).unwrap();
    fs::write(
        tmp.path().join("parts/strings.toml"),
        r#"
submitTask = "Envoyer"
submitTasks = "Envoyer les tâches"
"#,
    )
    .unwrap();
    fs::write(
        tmp.path().join("taskdesk.toml"),
        r#"
extends = "base.toml"

[api]
timeout_secs = 45

[user]
default_editor = "ID"

[messages]
imports = ["parts/strings.toml"]
submitTasks = "Valider"
"#,
    )
    .unwrap();

    let doc = taskdesk::config::load(&tmp.path().join("taskdesk.toml")).unwrap();
    let s = doc.settings().unwrap();
    assert_eq!(s.api.base_url, "https://tasks.example.org/api/v2/");
    assert_eq!(s.api.timeout_secs, 45);
    assert_eq!(s.user.locale, "fr");
    assert_eq!(s.user.default_editor, Some(EditorKind::Id));
    assert_eq!(s.messages["submitTask"], "Envoyer");
    assert_eq!(s.messages["submitTasks"], "Valider");
    assert!(doc.value.get("extends").is_none());
    assert!(doc.value["messages"].get("imports").is_none());
}

#[test]
fn extends_cycle_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("a.toml"), "extends = \"b.toml\"\n").unwrap();
    fs::write(tmp.path().join("b.toml"), "extends = \"a.toml\"\n").unwrap();

    let err = taskdesk::config::load(&tmp.path().join("a.toml")).unwrap_err();
    assert_eq!(err.kind(), taskdesk::error::ErrorKind::Config);
    assert!(err.to_string().contains("cycle"), "unexpected err: {err}");
}

#[test]
fn missing_explicit_config_is_an_error_but_missing_default_is_not() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope.toml");
    assert!(taskdesk::config::load_or_default(Some(&missing)).is_err());

    let doc = taskdesk::config::load_or_default(None).unwrap();
    let s = doc.settings().unwrap();
    assert!(!s.api.base_url.is_empty());
}

#[test]
fn messages_overrides_fall_back_to_catalog() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("taskdesk.toml");
    fs::write(&path, "[messages]\nsplitTask = \"Cut\"\n").unwrap();

    let s = taskdesk::config::load(&path).unwrap().settings().unwrap();
    let m = taskdesk::messages::Messages::new(s.messages);
    assert_eq!(m.get("splitTask"), "Cut");
    assert_eq!(m.get("submitTasks"), "Submit tasks");
    assert_eq!(m.get("notAKey"), "notAKey");
}
