use std::sync::Arc;
use tokio::sync::RwLock;

use rand::RngCore;

use crate::auth::token::TokenService;
use crate::clients::gemini::GeminiClient;
use crate::config::Config;
use crate::crypto::SecretCipher;
use crate::db::Store;
use crate::services::{
    AnalysisService, AuthService, SeaOrmAnalysisService, SeaOrmAuthService,
};

/// Generates a throwaway secret for development runs so the process can
/// start without configuration. Tokens and encrypted keys from a previous
/// run will not survive a restart.
fn ephemeral_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub tokens: Arc<TokenService>,

    pub cipher: Arc<SecretCipher>,

    pub auth_service: Arc<dyn AuthService>,

    pub analysis_service: Arc<dyn AnalysisService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        // validate() already rejected missing secrets for production, so a
        // fallback here only ever runs in development.
        let jwt_secret = config.auth.jwt_secret.clone().unwrap_or_else(|| {
            tracing::warn!("auth.jwt_secret not set, using an ephemeral development secret");
            ephemeral_secret()
        });

        let (enc_key, enc_salt) = match (
            config.encryption.key.clone(),
            config.encryption.salt.clone(),
        ) {
            (Some(key), Some(salt)) => (key, salt),
            _ => {
                tracing::warn!(
                    "encryption.key/salt not set, using ephemeral development secrets"
                );
                (ephemeral_secret(), ephemeral_secret())
            }
        };

        let tokens = Arc::new(TokenService::new(
            &jwt_secret,
            config.auth.access_token_ttl_minutes,
        ));
        let cipher = Arc::new(SecretCipher::new(&enc_key, &enc_salt));

        let gemini = Arc::new(GeminiClient::new(&config.gemini)?);

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            tokens.clone(),
            cipher.clone(),
            config.security.clone(),
        )) as Arc<dyn AuthService>;

        let analysis_service = Arc::new(SeaOrmAnalysisService::new(
            store.clone(),
            gemini,
            cipher.clone(),
            &config.gemini,
        )) as Arc<dyn AnalysisService>;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            tokens,
            cipher,
            auth_service,
            analysis_service,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
