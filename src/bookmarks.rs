//! Bookmark map (§3, §6): a persisted, order-preserving alias -> absolute
//! path mapping, backing the `bm` builtin.
//!
//! Grounded on the original `bookmark.c`'s five operations (load, save,
//! list, get, remove/add), which the distillation's surviving `tsh.c`
//! variant carries the data format for but never names an invoking
//! builtin for (§9) — `bm` is this crate's resolution of that gap.

use std::env;
use std::fs;
use std::os::unix::io::RawFd;
use std::sync::Mutex;
use std::sync::OnceLock;

#[derive(Default)]
struct BookmarkMap {
    entries: Vec<(String, String)>,
}

impl BookmarkMap {
    fn get(&self, alias: &str) -> Option<&str> {
        self.entries.iter().find(|(a, _)| a == alias).map(|(_, p)| p.as_str())
    }

    fn set(&mut self, alias: &str, path: String) {
        match self.entries.iter_mut().find(|(a, _)| a == alias) {
            Some(entry) => entry.1 = path,
            None => self.entries.push((alias.to_string(), path)),
        }
    }

    fn remove(&mut self, alias: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(a, _)| a != alias);
        self.entries.len() != before
    }
}

fn bookmarks_path() -> String {
    let home = crate::sys::home_dir().unwrap_or_default();
    format!("{home}/.tshinfo")
}

fn load(path: &str) -> BookmarkMap {
    let mut map = BookmarkMap::default();
    let Ok(text) = fs::read_to_string(path) else {
        return map; // missing file => empty map (§6)
    };
    let mut lines = text.lines();
    while let (Some(alias), Some(path)) = (lines.next(), lines.next()) {
        map.entries.push((alias.to_string(), path.to_string()));
    }
    map
}

fn save(path: &str, map: &BookmarkMap) -> std::io::Result<()> {
    let mut text = String::new();
    for (alias, p) in &map.entries {
        text.push_str(alias);
        text.push('\n');
        text.push_str(p);
        text.push('\n');
    }
    fs::write(path, text)
}

static GLOBAL: OnceLock<Mutex<BookmarkMap>> = OnceLock::new();

fn global() -> &'static Mutex<BookmarkMap> {
    GLOBAL.get_or_init(|| Mutex::new(load(&bookmarks_path())))
}

/// `bm add ALIAS [PATH]` / `bm rm ALIAS` / `bm ls` / `bm ALIAS` (§4.7).
pub fn run_bm(args: &[String], out_fd: RawFd) -> Result<(), String> {
    match args.first().map(String::as_str) {
        Some("add") => {
            let alias = args.get(1).ok_or("tsh: bm add: missing alias")?;
            let path = match args.get(2) {
                Some(p) => p.clone(),
                None => env::current_dir().map_err(|e| format!("tsh: bm add: {e}"))?.display().to_string(),
            };
            let mut map = global().lock().unwrap();
            map.set(alias, path);
            save(&bookmarks_path(), &map).map_err(|e| format!("tsh: bm: {e}"))
        }
        Some("rm") => {
            let alias = args.get(1).ok_or("tsh: bm rm: missing alias")?;
            let mut map = global().lock().unwrap();
            if !map.remove(alias) {
                return Err(format!("tsh: bm: {alias}: no such bookmark"));
            }
            save(&bookmarks_path(), &map).map_err(|e| format!("tsh: bm: {e}"))
        }
        Some("ls") => {
            let map = global().lock().unwrap();
            for (alias, path) in &map.entries {
                crate::sys::write_raw(out_fd, format!("{alias}\t{path}\n").as_bytes());
            }
            Ok(())
        }
        Some(alias) => {
            let target = {
                let map = global().lock().unwrap();
                map.get(alias).map(str::to_string)
            };
            match target {
                Some(path) => env::set_current_dir(&path).map_err(|e| format!("tsh: bm: {path}: {e}")),
                None => Err(format!("tsh: bm: {alias}: no such bookmark")),
            }
        }
        None => Err("tsh: bm: usage: bm {add|rm|ls|ALIAS}".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_save_and_load() {
        let dir = env::temp_dir().join(format!("tsh-bm-test-{}", sys_test_pid()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bookmarks").display().to_string();

        let mut map = BookmarkMap::default();
        map.set("proj", "/home/me/project".to_string());
        map.set("docs", "/home/me/docs".to_string());
        save(&path, &map).unwrap();

        let loaded = load(&path);
        assert_eq!(loaded.entries, map.entries);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let loaded = load("/nonexistent/path/for/tsh/tests/.tshinfo");
        assert!(loaded.entries.is_empty());
    }

    #[test]
    fn set_updates_existing_alias_in_place() {
        let mut map = BookmarkMap::default();
        map.set("a", "/one".to_string());
        map.set("a", "/two".to_string());
        assert_eq!(map.entries, vec![("a".to_string(), "/two".to_string())]);
    }

    fn sys_test_pid() -> u32 {
        std::process::id()
    }
}
