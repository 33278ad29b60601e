/// 마켓플레이스 계정 서비스 연동
/// 로그인/세션/OAuth는 계정 서비스 소관이며, 본 서비스는 요청에 실린
/// 베어러 토큰의 검증만 위임하고 입찰자 계정을 돌려받는다.
// region:    --- Imports
use serde::Deserialize;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Account Client
/// 계정 서비스가 반환하는 계정 정보
#[derive(Debug, Deserialize)]
pub struct AccountInfo {
    pub id: i64,
    pub username: String,
}

/// 계정 서비스 클라이언트
pub struct AccountClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for AccountClient {
    fn default() -> Self {
        Self::new()
    }
}

/// AccountClient 구현
impl AccountClient {
    pub fn new() -> Self {
        let base_url = std::env::var("ACCOUNT_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:4000".to_string());
        AccountClient {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Authorization 헤더의 베어러 토큰을 계정 서비스에 위임 검증
    pub async fn verify_bearer(&self, authorization: &str) -> Result<AccountInfo, String> {
        if !authorization.starts_with("Bearer ") {
            return Err("베어러 토큰이 아닙니다.".to_string());
        }

        let response = self
            .http
            .get(format!("{}/api/auth/verify", self.base_url))
            .header(reqwest::header::AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| format!("계정 서비스 호출 실패: {}", e))?;

        if !response.status().is_success() {
            warn!(
                "{:<12} --> 토큰 검증 거부: {}",
                "Account",
                response.status()
            );
            return Err("토큰 검증에 실패했습니다.".to_string());
        }

        let account = response
            .json::<AccountInfo>()
            .await
            .map_err(|e| format!("계정 응답 해석 실패: {}", e))?;
        info!("{:<12} --> 토큰 검증 성공: 계정 {}", "Account", account.id);
        Ok(account)
    }
}
// endregion: --- Account Client
