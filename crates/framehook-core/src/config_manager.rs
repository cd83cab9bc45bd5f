//! 설정 파일 관리.
//!
//! 플랫폼별 설정 디렉토리(또는 `--config`로 지정한 경로)의 JSON 파일로
//! 설정을 저장/로드한다. 저장은 임시 파일에 쓴 뒤 rename 한다.

use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::CoreError;

const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR_NAME: &str = "framehook";

/// 디스크 위의 설정 파일 하나
#[derive(Debug, Clone)]
struct ConfigFile {
    path: PathBuf,
}

impl ConfigFile {
    fn io_error(&self, action: &str, e: std::io::Error) -> CoreError {
        CoreError::Configuration(format!("{action} 실패 ({}): {e}", self.path.display()))
    }

    fn ensure_parent(&self) -> Result<(), CoreError> {
        let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) else {
            return Ok(());
        };
        if dir.is_dir() {
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|e| self.io_error("설정 디렉토리 생성", e))?;
        info!(dir = %dir.display(), "설정 디렉토리 생성");
        Ok(())
    }

    fn read(&self) -> Result<AppConfig, CoreError> {
        let raw = fs::read(&self.path).map_err(|e| self.io_error("설정 읽기", e))?;
        let config = serde_json::from_slice(&raw).map_err(|e| {
            CoreError::Configuration(format!("설정 JSON 오류 ({}): {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), "설정 로드");
        Ok(config)
    }

    fn write(&self, config: &AppConfig) -> Result<(), CoreError> {
        let body = serde_json::to_vec_pretty(config)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, body).map_err(|e| self.io_error("설정 쓰기", e))?;
        fs::rename(&staging, &self.path).map_err(|e| self.io_error("설정 교체", e))?;
        Ok(())
    }
}

/// 설정 관리자
///
/// 메모리의 `AppConfig`와 파일 내용을 함께 유지한다. 복제해도 같은 설정을 공유한다.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    current: Arc<RwLock<AppConfig>>,
    file: ConfigFile,
}

impl ConfigManager {
    /// `config_dir()/config.json` 사용
    pub fn new() -> Result<Self, CoreError> {
        Self::with_path(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// 지정 경로 사용. 파일이 없으면 기본값으로 만든다.
    pub fn with_path(path: PathBuf) -> Result<Self, CoreError> {
        let file = ConfigFile { path };
        file.ensure_parent()?;

        let initial = match file.path.try_exists() {
            Ok(true) => file.read()?,
            Ok(false) => {
                let defaults = AppConfig::default();
                file.write(&defaults)?;
                info!(path = %file.path.display(), "기본 설정 파일 작성");
                defaults
            }
            Err(e) => return Err(file.io_error("설정 파일 확인", e)),
        };

        Ok(Self {
            current: Arc::new(RwLock::new(initial)),
            file,
        })
    }

    /// 현재 설정 스냅샷
    pub fn get(&self) -> AppConfig {
        self.current.read().clone()
    }

    /// 검증을 통과한 설정만 파일과 메모리에 반영
    pub fn update(&self, next: AppConfig) -> Result<(), CoreError> {
        next.validate()?;
        self.file.write(&next)?;
        *self.current.write() = next;
        debug!(path = %self.file.path.display(), "설정 갱신");
        Ok(())
    }

    /// 현재 설정을 고쳐서 `update`. 반영된 설정을 돌려준다.
    pub fn update_with(
        &self,
        edit: impl FnOnce(&mut AppConfig),
    ) -> Result<AppConfig, CoreError> {
        let mut draft = self.get();
        edit(&mut draft);
        self.update(draft.clone())?;
        Ok(draft)
    }

    pub fn config_path(&self) -> &Path {
        &self.file.path
    }

    /// 파일 내용으로 메모리 설정 교체
    pub fn reload(&self) -> Result<(), CoreError> {
        let fresh = self.file.read()?;
        *self.current.write() = fresh;
        info!(path = %self.file.path.display(), "설정 재로드");
        Ok(())
    }

    /// 플랫폼별 설정 디렉토리
    ///
    /// - macOS: `~/Library/Application Support/framehook`
    /// - Windows: `%APPDATA%\framehook`
    /// - Linux: `$XDG_CONFIG_HOME/framehook`, 없으면 `~/.config/framehook`
    pub fn config_dir() -> Result<PathBuf, CoreError> {
        Ok(platform_base_dir()?.join(APP_DIR_NAME))
    }
}

fn env_dir(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn required_env_dir(key: &str) -> Result<PathBuf, CoreError> {
    env_dir(key).ok_or_else(|| CoreError::Configuration(format!("환경 변수 {key} 없음")))
}

#[cfg(target_os = "macos")]
fn platform_base_dir() -> Result<PathBuf, CoreError> {
    Ok(required_env_dir("HOME")?.join("Library/Application Support"))
}

#[cfg(target_os = "windows")]
fn platform_base_dir() -> Result<PathBuf, CoreError> {
    required_env_dir("APPDATA")
}

#[cfg(target_os = "linux")]
fn platform_base_dir() -> Result<PathBuf, CoreError> {
    match env_dir("XDG_CONFIG_HOME") {
        Some(xdg) => Ok(xdg),
        None => Ok(required_env_dir("HOME")?.join(".config")),
    }
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
fn platform_base_dir() -> Result<PathBuf, CoreError> {
    tracing::warn!("알 수 없는 플랫폼: 현재 디렉토리에 설정 저장");
    Ok(PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Discipline, TriggerConfig, TriggerConfigKind};
    use crate::models::region::CropSpec;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> ConfigManager {
        ConfigManager::with_path(dir.path().join(CONFIG_FILE_NAME)).unwrap()
    }

    #[test]
    fn missing_file_is_written_with_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        assert!(manager.config_path().is_file());
        let on_disk: AppConfig =
            serde_json::from_slice(&fs::read(manager.config_path()).unwrap()).unwrap();
        assert_eq!(on_disk.scheduler.interval_ms, 1_000);
        assert_eq!(manager.get().workers.num_workers, 2);
    }

    #[test]
    fn edits_survive_reopen_in_nested_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a").join("b").join(CONFIG_FILE_NAME);

        let manager = ConfigManager::with_path(path.clone()).unwrap();
        let applied = manager
            .update_with(|c| {
                c.scheduler.discipline = Discipline::Interval;
                c.scheduler.interval_ms = 500;
                c.triggers.push(TriggerConfig {
                    id: Some("score".to_string()),
                    title: "점수".to_string(),
                    enabled: true,
                    kind: TriggerConfigKind::Recognition,
                    crop: CropSpec::percent(80.0, 35.0, 10.0, 29.0),
                    ..TriggerConfig::default()
                });
            })
            .unwrap();
        assert_eq!(applied.scheduler.interval_ms, 500);
        assert!(!path.with_extension("json.tmp").exists(), "임시 파일이 남으면 안 됨");

        let reopened = ConfigManager::with_path(path).unwrap().get();
        assert_eq!(reopened.scheduler.discipline, Discipline::Interval);
        assert_eq!(reopened.triggers[0].id.as_deref(), Some("score"));
        assert_eq!(reopened.triggers[0].crop.x, 80.0);
    }

    #[test]
    fn rejected_update_leaves_memory_and_file_untouched() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let before = fs::read_to_string(manager.config_path()).unwrap();

        assert_matches!(
            manager.update_with(|c| c.workers.num_workers = 0),
            Err(CoreError::Configuration(_))
        );
        assert_eq!(manager.get().workers.num_workers, 2);
        assert_eq!(fs::read_to_string(manager.config_path()).unwrap(), before);
    }

    #[test]
    fn reload_picks_up_external_edit() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);
        let shared = manager.clone();

        let mut edited = manager.get();
        edited.scheduler.refresh_hz = 30;
        fs::write(manager.config_path(), serde_json::to_vec(&edited).unwrap()).unwrap();
        assert_eq!(shared.get().scheduler.refresh_hz, 60);

        manager.reload().unwrap();
        assert_eq!(shared.get().scheduler.refresh_hz, 30);
    }

    #[test]
    fn broken_json_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        assert_matches!(
            ConfigManager::with_path(path),
            Err(CoreError::Configuration(msg)) if msg.contains("JSON")
        );
    }

    #[test]
    fn config_dir_ends_with_app_name() {
        let dir = ConfigManager::config_dir().unwrap();
        assert!(dir.ends_with(APP_DIR_NAME));
    }
}
