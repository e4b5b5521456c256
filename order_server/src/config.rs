use std::{env, net::IpAddr};

use chrono::Duration;
use gateway_tools::GatewayConfig;
use log::*;
use market_common::{helpers::parse_boolean_flag, Money, Secret, DEFAULT_CURRENCY_CODE};
use order_engine::{CheckoutOptions, PricingPolicy, RefundStockPolicy};

const DEFAULT_MKT_HOST: &str = "127.0.0.1";
const DEFAULT_MKT_PORT: u16 = 8460;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/market_store.db";
const DEFAULT_HMAC_HEADER: &str = "X-Gateway-Signature";
const DEFAULT_UNPAID_ORDER_TIMEOUT: Duration = Duration::hours(48);
const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::hours(24);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    pub pricing: PricingPolicy,
    pub refund_policy: RefundStockPolicy,
    pub idempotency_ttl: Duration,
    /// Pending orders older than this are cancelled and their stock returned.
    pub unpaid_order_timeout: Duration,
    pub gateway: GatewayConfig,
    pub webhook: WebhookConfig,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub hmac_secret: Secret<String>,
    pub hmac_header: String,
    /// Only ever disable this for local testing
    pub hmac_checks: bool,
    /// If supplied, webhook deliveries from any other address are refused.
    pub whitelist: Option<Vec<IpAddr>>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            hmac_secret: Secret::default(),
            hmac_header: DEFAULT_HMAC_HEADER.to_string(),
            hmac_checks: true,
            whitelist: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MKT_HOST.to_string(),
            port: DEFAULT_MKT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            pricing: PricingPolicy::default(),
            refund_policy: RefundStockPolicy::default(),
            idempotency_ttl: DEFAULT_IDEMPOTENCY_TTL,
            unpaid_order_timeout: DEFAULT_UNPAID_ORDER_TIMEOUT,
            gateway: GatewayConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MKT_HOST").ok().unwrap_or_else(|| DEFAULT_MKT_HOST.into());
        let port = env::var("MKT_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MKT_PORT. {e} Using the default, {DEFAULT_MKT_PORT}, instead."
                    );
                    DEFAULT_MKT_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_MKT_PORT);
        let database_url = env::var("MKT_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ MKT_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("MKT_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("MKT_USE_FORWARDED").ok(), false);
        let refund_policy = if parse_boolean_flag(env::var("MKT_REFUND_RESTOCK").ok(), true) {
            RefundStockPolicy::Restock
        } else {
            info!("🪛️ Refunded orders will not be restocked");
            RefundStockPolicy::Retain
        };
        let idempotency_ttl = hours_from_env("MKT_IDEMPOTENCY_TTL_HOURS", DEFAULT_IDEMPOTENCY_TTL);
        let unpaid_order_timeout = hours_from_env("MKT_UNPAID_ORDER_TIMEOUT", DEFAULT_UNPAID_ORDER_TIMEOUT);
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            pricing: pricing_from_env(),
            refund_policy,
            idempotency_ttl,
            unpaid_order_timeout,
            gateway: GatewayConfig::new_from_env_or_default(),
            webhook: WebhookConfig::from_env_or_defaults(),
        }
    }

    pub fn checkout_options(&self) -> CheckoutOptions {
        CheckoutOptions { idempotency_ttl: self.idempotency_ttl }
    }
}

impl WebhookConfig {
    pub fn from_env_or_defaults() -> Self {
        let hmac_secret = env::var("MKT_GATEWAY_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ MKT_GATEWAY_WEBHOOK_SECRET is not set. Please set it to the webhook signing key configured with \
                 your payment provider."
            );
            String::default()
        });
        let hmac_header = env::var("MKT_GATEWAY_HMAC_HEADER").unwrap_or_else(|_| DEFAULT_HMAC_HEADER.to_string());
        let hmac_checks = parse_boolean_flag(env::var("MKT_GATEWAY_HMAC_CHECKS").ok(), true);
        if !hmac_checks {
            warn!("🚨️ Webhook signature checks are DISABLED. Never run a production server like this.");
        }
        let whitelist = env::var("MKT_GATEWAY_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The gateway IP whitelist was configured, but is empty. The server will run, but won't accept \
                     any webhook deliveries."
                );
            },
            None => info!("🪛️ No gateway IP whitelist is set. Only signature validation will be used."),
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Gateway IP whitelist: {addrs}");
            },
        }
        Self { hmac_secret: Secret::new(hmac_secret), hmac_header, hmac_checks, whitelist }
    }
}

fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0", ""].contains(&s.trim().to_lowercase().as_str()) {
        return None;
    }
    let ip_addrs = s
        .split(',')
        .filter_map(|s| {
            s.trim()
                .parse()
                .map_err(|e| warn!("🪛️ Ignoring invalid IP address ({s}) in MKT_GATEWAY_IP_WHITELIST: {e}"))
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

fn pricing_from_env() -> PricingPolicy {
    let currency = env::var("MKT_CURRENCY").unwrap_or_else(|_| DEFAULT_CURRENCY_CODE.to_string());
    let tax_rate_bps = env::var("MKT_TAX_RATE_BPS")
        .ok()
        .and_then(|s| s.parse::<u32>().map_err(|e| warn!("🪛️ Invalid MKT_TAX_RATE_BPS: {s}. {e}")).ok())
        .unwrap_or_default();
    let shipping_flat = money_from_env("MKT_SHIPPING_FLAT").unwrap_or_default();
    let pricing = PricingPolicy::new(&currency)
        .with_tax_rate_bps(tax_rate_bps)
        .with_flat_shipping(shipping_flat)
        .with_free_shipping_threshold(money_from_env("MKT_FREE_SHIPPING_THRESHOLD"));
    info!(
        "🪛️ Pricing: {} with tax of {tax_rate_bps} bps and {} flat shipping",
        pricing.currency, pricing.shipping_flat
    );
    pricing
}

/// Amounts in configuration are given in minor units.
fn money_from_env(name: &str) -> Option<Money> {
    let s = env::var(name).ok()?;
    match s.trim().parse::<i64>() {
        Ok(v) if v >= 0 => Some(Money::from(v)),
        Ok(v) => {
            warn!("🪛️ {name} cannot be negative ({v}). Ignoring it.");
            None
        },
        Err(e) => {
            warn!("🪛️ Invalid value for {name}: {s}. {e}. Ignoring it.");
            None
        },
    }
}

fn hours_from_env(name: &str, default: Duration) -> Duration {
    env::var(name)
        .map_err(|_| info!("🪛️ {name} is not set. Using the default value of {} hrs.", default.num_hours()))
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::hours)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}"))
        })
        .ok()
        .unwrap_or(default)
}
