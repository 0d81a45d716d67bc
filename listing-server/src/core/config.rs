use std::path::PathBuf;

use crate::auth::JwtConfig;
use crate::images::StorageBackend;
use crate::images::intake::{MAX_FILE_SIZE, UploadPolicy};

/// 服务器配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 |
/// | DATABASE_PATH | {WORK_DIR}/listing.db | SQLite 数据库文件 |
/// | UPLOAD_ROOT | {WORK_DIR}/uploads | 旧版图片文件根目录 |
/// | HTTP_PORT | 5000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | IMAGE_STORAGE | database | 新图片存储后端: database \| filesystem |
/// | MAX_UPLOAD_SIZE | 5242880 | 单个文件上限 (字节) |
/// | STAGED_IMAGE_TTL_SECS | 86400 | 未关联图片保留时间 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | - | 日志目录 (按天滚动) |
/// | LOG_JSON | false | JSON 日志 |
/// | JWT_SECRET | 开发环境随机生成 | HS256 密钥, 生产环境必填 |
/// | JWT_ISSUER / JWT_AUDIENCE | listing-server / listing-clients | |
/// | JWT_EXPIRATION_MINUTES | 1440 | |
///
/// ```ignore
/// WORK_DIR=/srv/listing IMAGE_STORAGE=filesystem cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: PathBuf,
    pub database_path: PathBuf,
    /// 旧版图片文件根目录
    pub upload_root: PathBuf,
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub image_storage: StorageBackend,
    /// 所有上传策略共用的单文件上限
    pub max_upload_size: usize,
    pub staged_image_ttl_secs: u64,
    pub log_level: String,
    pub log_dir: Option<String>,
    pub log_json: bool,
    pub jwt: JwtConfig,
    /// 未设置 JWT_SECRET, 使用了临时开发密钥
    pub jwt_secret_generated: bool,
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let work_dir = PathBuf::from(env_or("WORK_DIR", "./data"));
        let environment = env_or("ENVIRONMENT", "development");

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| work_dir.join("listing.db"));
        let upload_root = std::env::var("UPLOAD_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| work_dir.join("uploads"));

        let mut config = Self {
            work_dir,
            database_path,
            upload_root,
            http_port: env_parse("HTTP_PORT", 5000),
            environment,
            image_storage: env_parse("IMAGE_STORAGE", StorageBackend::Database),
            max_upload_size: env_parse("MAX_UPLOAD_SIZE", MAX_FILE_SIZE),
            staged_image_ttl_secs: env_parse("STAGED_IMAGE_TTL_SECS", 86_400),
            log_level: env_or("LOG_LEVEL", "info"),
            log_dir: std::env::var("LOG_DIR").ok().filter(|d| !d.is_empty()),
            log_json: matches!(std::env::var("LOG_JSON").as_deref(), Ok("true" | "1")),
            jwt: JwtConfig::default(),
            jwt_secret_generated: false,
        };

        let (jwt, generated) = jwt_from_env(config.is_production());
        config.jwt = jwt;
        config.jwt_secret_generated = generated;
        config
    }

    /// 使用自定义值覆盖部分配置 (测试用)
    ///
    /// 数据库和上传目录都放在 `work_dir` 下
    pub fn with_overrides(work_dir: impl Into<PathBuf>, image_storage: StorageBackend) -> Self {
        let mut config = Self::from_env();
        let work_dir = work_dir.into();
        config.database_path = work_dir.join("listing.db");
        config.upload_root = work_dir.join("uploads");
        config.work_dir = work_dir;
        config.image_storage = image_storage;
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 随房源创建/更新提交的图片限制
    pub fn property_upload_policy(&self) -> UploadPolicy {
        UploadPolicy::property_images(self.max_upload_size)
    }

    /// `POST /api/upload/images` 的上传限制
    pub fn staged_upload_policy(&self) -> UploadPolicy {
        UploadPolicy::staged_images(self.max_upload_size)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 生产环境缺少 `JWT_SECRET` 时密钥为空, JWT 服务启动时会拒绝
///
/// 返回 (配置, 是否使用临时开发密钥)
fn jwt_from_env(production: bool) -> (JwtConfig, bool) {
    let defaults = JwtConfig::default();
    let (secret, generated) = match std::env::var("JWT_SECRET") {
        Ok(secret) => (secret, false),
        Err(_) if production => (String::new(), false),
        Err(_) => (defaults.secret, true),
    };

    let jwt = JwtConfig {
        secret,
        expiration_minutes: env_parse("JWT_EXPIRATION_MINUTES", defaults.expiration_minutes),
        issuer: std::env::var("JWT_ISSUER").unwrap_or(defaults.issuer),
        audience: std::env::var("JWT_AUDIENCE").unwrap_or(defaults.audience),
    };
    (jwt, generated)
}
