use anyhow::Context;

const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub admin_password: String,
    /// Clinic number the confirmation deep link points to.
    pub whatsapp_number: Option<String>,
    pub alert_webhook_url: Option<String>,
    /// Allowed browser origin; any origin when unset.
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match optional("PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", raw))?,
            None => 3000,
        };

        Ok(Self {
            database_url: optional("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:clinic.db?mode=rwc".into()),
            host: optional("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            admin_password: optional("ADMIN_PASSWORD")
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.into()),
            whatsapp_number: optional("CLINIC_WHATSAPP"),
            alert_webhook_url: optional("ALERT_WEBHOOK_URL"),
            cors_origin: optional("CORS_ORIGIN"),
        })
    }

    /// Log settings that fall back to unsafe or degraded defaults.
    /// Called once tracing is up.
    pub fn warn_on_defaults(&self) {
        if self.admin_password == DEFAULT_ADMIN_PASSWORD {
            tracing::warn!("ADMIN_PASSWORD not set, using the default password");
        }
        if self.whatsapp_number.is_none() {
            tracing::warn!("CLINIC_WHATSAPP not set, confirmations carry no WhatsApp link");
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
