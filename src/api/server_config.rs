//! 服务器配置常量

use std::time::Duration;

/// 并发连接限制
pub const MAX_CONCURRENCY: usize = 256;

/// 请求体大小限制
pub const MAX_BODY_SIZE: usize = 256 * 1024; // 256KB

/// 请求超时时间
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// CORS最大缓存时间
pub const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

/// Header carrying the authenticated caller identity (NIN or issuer name)
pub const CALLER_ID_HEADER: &str = "x-caller-id";

/// Header carrying the caller role: student, institution or admin
pub const CALLER_ROLE_HEADER: &str = "x-caller-role";
