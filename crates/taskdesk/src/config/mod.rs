use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use toml::Value;

use crate::editors::EditorKind;
use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "taskdesk.toml";
const DEFAULT_TOKEN_ENV: &str = "TASKDESK_TOKEN";

#[derive(Debug, Clone)]
pub struct ConfigDoc {
    pub path: PathBuf,
    pub value: Value,
}

impl ConfigDoc {
    pub fn empty() -> Self {
        Self {
            path: PathBuf::from("<defaults>"),
            value: Value::Table(Default::default()),
        }
    }

    pub fn value_path(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return Some(&self.value);
        }

        let mut cur = &self.value;
        for seg in path.split('.') {
            let tbl = cur.as_table()?;
            cur = tbl.get(seg)?;
        }
        Some(cur)
    }

    pub fn deserialize_path<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let Some(v) = self.value_path(path) else {
            return Ok(None);
        };
        let parsed = v.clone().try_into().map_err(|e| {
            Error::config(format!(
                "failed to deserialize config at '{}' in {}: {e}",
                path,
                self.path.display()
            ))
        })?;
        Ok(Some(parsed))
    }

    pub fn settings(&self) -> Result<Settings> {
        Ok(Settings {
            api: self.deserialize_path("api")?.unwrap_or_default(),
            user: self.deserialize_path("user")?.unwrap_or_default(),
            editors: self.deserialize_path("editors")?.unwrap_or_default(),
            workflow: self.deserialize_path("workflow")?.unwrap_or_default(),
            log: self.deserialize_path("log")?.unwrap_or_default(),
            messages: self.deserialize_path("messages")?.unwrap_or_default(),
        })
    }
}

fn default_base_url() -> String {
    "http://localhost:5000/api/v2/".into()
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_locale() -> String {
    "en".into()
}

fn default_josm_remote_control() -> String {
    "http://127.0.0.1:8111".into()
}

fn default_log_filter() -> String {
    "info".into()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("taskdesk.log")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub token: Option<String>,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    // Inline `token` wins over the environment variable.
    pub fn resolve_token(&self) -> Result<String> {
        if let Some(t) = self.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Ok(t.to_string());
        }
        match std::env::var(&self.token_env) {
            Ok(t) if !t.trim().is_empty() => Ok(t.trim().to_string()),
            _ => Err(Error::config(format!(
                "no API token configured: set [api] token or export {}",
                self.token_env
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub username: Option<String>,
    pub default_editor: Option<EditorKind>,
    #[serde(default = "default_locale")]
    pub locale: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            username: None,
            default_editor: None,
            locale: default_locale(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EditorsConfig {
    #[serde(default = "default_josm_remote_control")]
    pub josm_remote_control: String,
    /// Launch hand-off URLs in the system browser from the TUI.
    pub open_in_browser: bool,
}

impl Default for EditorsConfig {
    fn default() -> Self {
        Self {
            josm_remote_control: default_josm_remote_control(),
            open_in_browser: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Navigate to the task list even when an action request failed.
    pub optimistic_navigation: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
    #[serde(default = "default_log_filter")]
    pub filter: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            filter: default_log_filter(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub api: ApiConfig,
    pub user: UserConfig,
    pub editors: EditorsConfig,
    pub workflow: WorkflowConfig,
    pub log: LogConfig,
    pub messages: BTreeMap<String, String>,
}

fn merge_values(base: &mut Value, child: Value) {
    match (base, child) {
        (Value::Table(base_tbl), Value::Table(child_tbl)) => {
            for (k, v) in child_tbl {
                match base_tbl.get_mut(&k) {
                    Some(existing) => merge_values(existing, v),
                    None => {
                        base_tbl.insert(k, v);
                    }
                }
            }
        }
        (base_slot, child_val) => {
            *base_slot = child_val;
        }
    }
}

pub fn merge(base: &mut Value, overlay: Value) {
    merge_values(base, overlay);
}

fn resolve_ref_path(from_file: &Path, reference: &str) -> PathBuf {
    let p = PathBuf::from(reference);
    if p.is_absolute() {
        p
    } else {
        from_file.parent().unwrap_or_else(|| Path::new(".")).join(p)
    }
}

fn parse_imports(path: &Path, table: &toml::value::Table) -> Result<Vec<String>> {
    let Some(arr) = table.get("imports").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for v in arr {
        let Some(s) = v.as_str() else {
            return Err(Error::config(format!(
                "invalid imports entry in {} (expected string)",
                path.display()
            )));
        };
        let s = s.trim();
        if !s.is_empty() {
            out.push(s.to_string());
        }
    }
    Ok(out)
}

fn inline_imports(file_path: &Path, value: &mut Value, stack: &mut HashSet<PathBuf>) -> Result<()> {
    let Value::Table(tbl) = value else {
        return Ok(());
    };

    let imports = parse_imports(file_path, tbl)?;
    tbl.remove("imports");
    if !imports.is_empty() {
        let mut acc = Value::Table(Default::default());
        for imp in imports {
            let loaded = load_value_inner(&resolve_ref_path(file_path, &imp), stack)?;
            merge_values(&mut acc, loaded);
        }
        // Local keys override whatever the imports provided.
        merge_values(&mut acc, Value::Table(std::mem::take(tbl)));
        if let Value::Table(merged) = acc {
            *tbl = merged;
        }
    }

    for (_, v) in tbl.iter_mut() {
        inline_imports(file_path, v, stack)?;
    }
    Ok(())
}

fn load_value_inner(path: &Path, stack: &mut HashSet<PathBuf>) -> Result<Value> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !stack.insert(canonical.clone()) {
        return Err(Error::config(format!(
            "config import cycle detected at {}",
            canonical.display()
        )));
    }

    let data = fs::read_to_string(path)
        .map_err(|e| Error::config(format!("failed to read config {}: {e}", path.display())))?;
    let mut value: Value = toml::from_str(&data)
        .map_err(|e| Error::config(format!("TOML parse error in {}: {e}", path.display())))?;

    let mut out = Value::Table(Default::default());
    if let Some(ext) = value.get("extends").and_then(Value::as_str) {
        out = load_value_inner(&resolve_ref_path(path, ext), stack)?;
    }
    if let Some(tbl) = value.as_table_mut() {
        tbl.remove("extends");
    }

    inline_imports(path, &mut value, stack)?;
    merge_values(&mut out, value);

    stack.remove(&canonical);
    Ok(out)
}

pub fn load(path: &Path) -> Result<ConfigDoc> {
    let mut stack = HashSet::<PathBuf>::new();
    let value = load_value_inner(path, &mut stack)?;
    Ok(ConfigDoc {
        path: path.to_path_buf(),
        value,
    })
}

/// Loads `path` when given, else `taskdesk.toml` if present, else defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<ConfigDoc> {
    match path {
        Some(p) => load(p),
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.is_file() {
                load(fallback)
            } else {
                Ok(ConfigDoc::empty())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(src: &str) -> ConfigDoc {
        ConfigDoc {
            path: PathBuf::from("<mem>"),
            value: toml::from_str(src).unwrap(),
        }
    }

    #[test]
    fn empty_doc_yields_defaults() {
        let s = ConfigDoc::empty().settings().unwrap();
        assert_eq!(s.api.timeout_secs, 30);
        assert_eq!(s.api.token_env, "TASKDESK_TOKEN");
        assert_eq!(s.user.locale, "en");
        assert!(!s.workflow.optimistic_navigation);
        assert!(s.messages.is_empty());
    }

    #[test]
    fn typed_sections_parse() {
        let s = doc(
            r#"
[api]
base_url = "https://tasks.example.org/api/v2/"
token = "abc"

[user]
default_editor = "JOSM"

[workflow]
optimistic_navigation = true

[messages]
submitTask = "Send it"
"#,
        )
        .settings()
        .unwrap();
        assert_eq!(s.api.base_url, "https://tasks.example.org/api/v2/");
        assert_eq!(s.api.resolve_token().unwrap(), "abc");
        assert_eq!(s.user.default_editor, Some(EditorKind::Josm));
        assert!(s.workflow.optimistic_navigation);
        assert_eq!(s.messages.get("submitTask").map(String::as_str), Some("Send it"));
    }

    #[test]
    fn bad_editor_name_is_a_config_error() {
        let err = doc("[user]\ndefault_editor = \"NOTEPAD\"\n")
            .settings()
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
        assert!(err.to_string().contains("user"), "unexpected err: {err}");
    }

    #[test]
    fn merge_overrides_scalars_and_keeps_siblings() {
        let mut base: Value = toml::from_str("[api]\nbase_url = \"a\"\ntimeout_secs = 5\n").unwrap();
        merge(&mut base, toml::from_str("[api]\nbase_url = \"b\"\n").unwrap());
        assert_eq!(base["api"]["base_url"].as_str(), Some("b"));
        assert_eq!(base["api"]["timeout_secs"].as_integer(), Some(5));
    }
}
