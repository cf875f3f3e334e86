use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tauri::plugin::{Builder, TauriPlugin};
use tauri::{AppHandle, Emitter, Manager, Wry};
use tracing::{info, warn};

use crate::core::config::{download_dir, TransferConfig};
use crate::core::error::TransferError;
use crate::core::game::GameMetadata;
use crate::core::install::remove_dir_if_exists;
use crate::core::progress::{ProgressChannel, ProgressEvent, ProgressListener};
use crate::core::state::{JsonFileStore, SettingsStore};
use crate::core::transfer::{DownloadRequest, ExportSummary, ImportSummary, TransferService};

pub struct DesktopState {
    pub service: Arc<TransferService>,
    pub store: Arc<JsonFileStore>,
}

/// Forwards progress to the webview as `<channel>-progress` events.
struct TauriListener {
    app: AppHandle,
}

impl ProgressListener for TauriListener {
    fn on_progress(&self, channel: ProgressChannel, event: &ProgressEvent) {
        if let Err(e) = self.app.emit(channel.event_name(), event.clone()) {
            warn!("Failed to emit {}: {}", channel.event_name(), e);
        }
    }
}

/// The transfer commands as a Tauri plugin; register with
/// `tauri::Builder::default().plugin(gameshelf_lib::plugin())`.
pub fn plugin() -> TauriPlugin<Wry> {
    Builder::new("gameshelf")
        .invoke_handler(tauri::generate_handler![
            download_and_extract,
            export_games,
            import_games,
            get_store_value,
            set_store_value,
            get_download_path,
            remove_directory,
            launch_game,
        ])
        .setup(|app, _api| {
            crate::init_tracing();

            let service = TransferService::new(TransferConfig::load())?;
            for channel in ProgressChannel::ALL {
                service.progress().subscribe(
                    channel,
                    Arc::new(TauriListener { app: app.clone() }),
                );
            }
            let store = JsonFileStore::open(JsonFileStore::default_location());
            info!("Settings store at {:?}", store.path());

            app.manage(DesktopState {
                service: Arc::new(service),
                store: Arc::new(store),
            });
            Ok(())
        })
        .build()
}

#[tauri::command]
pub async fn download_and_extract(
    state: tauri::State<'_, DesktopState>,
    id: String,
    url: String,
    dest_dir: PathBuf,
    file_name: String,
) -> Result<u64, TransferError> {
    let service = Arc::clone(&state.service);
    service
        .download_and_extract(DownloadRequest {
            id,
            url,
            dest_dir,
            file_name,
        })
        .await
}

#[tauri::command]
pub async fn export_games(
    state: tauri::State<'_, DesktopState>,
    games: Vec<GameMetadata>,
    archive: PathBuf,
) -> Result<ExportSummary, TransferError> {
    let service = Arc::clone(&state.service);
    service.export_games(&games, &archive).await
}

#[tauri::command]
pub async fn import_games(
    state: tauri::State<'_, DesktopState>,
    archive: PathBuf,
    dest_root: PathBuf,
) -> Result<ImportSummary, TransferError> {
    let service = Arc::clone(&state.service);
    service.import_games(&archive, &dest_root).await
}

#[tauri::command]
pub fn get_store_value(
    state: tauri::State<'_, DesktopState>,
    key: String,
    default: Option<Value>,
) -> Option<Value> {
    state.store.get_or(&key, default)
}

#[tauri::command]
pub fn set_store_value(
    state: tauri::State<'_, DesktopState>,
    key: String,
    value: Value,
) -> Result<(), TransferError> {
    state.store.set(&key, value)
}

#[tauri::command]
pub fn get_download_path() -> PathBuf {
    download_dir()
}

#[tauri::command]
pub async fn remove_directory(path: PathBuf) -> Result<bool, TransferError> {
    remove_dir_if_exists(&path).await
}

#[tauri::command]
pub fn launch_game(execution_path: PathBuf) -> Result<u32, TransferError> {
    crate::core::launch::launch_game(&execution_path)
}
