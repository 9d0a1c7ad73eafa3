use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for a kiosk running next to a local
/// ComfyUI instance. Override via environment variables (a `.env` file is
/// honored).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// ComfyUI HTTP base URL (default: `http://127.0.0.1:8188`).
    pub comfy_url: String,
    /// Client id announced to ComfyUI on every connection. One per
    /// process; generated when not configured.
    pub comfy_client_id: String,
    /// Path ComfyUI loads the capture frame from (default:
    /// `ComfyUI/input/input.png`).
    pub comfy_input_path: PathBuf,
    /// Directory of workflow style definitions (default: `workflows`).
    pub workflow_dir: PathBuf,
    /// Gallery root; captures go to `input/`, artifacts to `output/`
    /// (default: `gallery`).
    pub gallery_dir: PathBuf,
    /// Allowed CORS origins, comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                  |
    /// |------------------------|--------------------------|
    /// | `HOST`                 | `0.0.0.0`                |
    /// | `PORT`                 | `8080`                   |
    /// | `COMFY_SERVER_URL`     | `http://127.0.0.1:8188`  |
    /// | `COMFY_CLIENT_ID`      | random UUID              |
    /// | `COMFY_INPUT_PATH`     | `ComfyUI/input/input.png`|
    /// | `WORKFLOW_DIR`         | `workflows`              |
    /// | `GALLERY_DIR`          | `gallery`                |
    /// | `CORS_ORIGINS`         | `http://localhost:8080`  |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .expect("PORT must be a valid u16");

        let comfy_url =
            std::env::var("COMFY_SERVER_URL").unwrap_or_else(|_| "http://127.0.0.1:8188".into());

        let comfy_client_id = std::env::var("COMFY_CLIENT_ID")
            .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

        let comfy_input_path = PathBuf::from(
            std::env::var("COMFY_INPUT_PATH")
                .unwrap_or_else(|_| "ComfyUI/input/input.png".into()),
        );

        let workflow_dir =
            PathBuf::from(std::env::var("WORKFLOW_DIR").unwrap_or_else(|_| "workflows".into()));

        let gallery_dir =
            PathBuf::from(std::env::var("GALLERY_DIR").unwrap_or_else(|_| "gallery".into()));

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:8080".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            comfy_url,
            comfy_client_id,
            comfy_input_path,
            workflow_dir,
            gallery_dir,
            cors_origins,
            request_timeout_secs,
        }
    }

    /// Directory captured input frames are archived to.
    pub fn gallery_input_dir(&self) -> PathBuf {
        self.gallery_dir.join("input")
    }

    /// Directory generated artifacts are archived to.
    pub fn gallery_output_dir(&self) -> PathBuf {
        self.gallery_dir.join("output")
    }
}
