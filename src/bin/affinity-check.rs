use session_affinity::verifier::{responses_chain, AffinitySession, EXIT_INCONCLUSIVE};
use session_affinity::{AffinityVerifier, GatewayConfig, Verdict};
use anyhow::Context;

const FOLLOW_UPS_ENV: &str = "FOLLOW_UPS";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let code = match run().await {
        Ok(verdict) => verdict.exit_code(),
        Err(e) => {
            log::error!("{:#}", e);
            EXIT_INCONCLUSIVE
        }
    };
    std::process::exit(code);
}

async fn run() -> anyhow::Result<Verdict> {
    let config = GatewayConfig::from_env().context("cannot load gateway configuration")?;
    let follow_ups = match std::env::var(FOLLOW_UPS_ENV) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("{FOLLOW_UPS_ENV} must be a number, got {raw:?}"))?,
        Err(_) => 1,
    };

    println!("Testing session affinity");
    println!("Gateway: {}", config.gateway_url);
    println!("Deployment: {}", config.deployment);
    println!("{}", "=".repeat(60));

    let steps = responses_chain(&config.deployment, follow_ups);
    let verifier = AffinityVerifier::from_config(config).context("cannot build HTTP client")?;
    let session = verifier.execute(&steps).await;

    report(&session);
    Ok(session.verdict())
}

fn report(session: &AffinitySession) {
    for (i, exchange) in session.exchanges.iter().enumerate() {
        let req = &exchange.request;
        let resp = &exchange.response;
        println!("Step {} -> {} {} [{}]", i + 1, req.method, req.url.path(), resp.status);
        println!("  Request cookies: {}", req.cookie.as_deref().unwrap_or("None"));
        for cookie in &resp.set_cookies {
            println!("  Response set-cookie: {}", cookie);
        }
        println!("  Backend: {}, Session: {}, Request: {}", resp.backend_pool, resp.session_id, resp.request_id);
        println!("  Region: {}, Routing: {}", resp.region, resp.routing_decision);
        if let Some(step) = session.steps.get(i) {
            println!("  Id: {}", step.identifier.as_deref().unwrap_or("none"));
            if let Some(preview) = &step.preview {
                println!("  Content: {}", preview);
            }
        }
    }

    for failure in &session.failures {
        let req = &failure.request;
        println!("Failed -> {} {}", req.method, req.url.path());
        println!("  Request cookies: {}", req.cookie.as_deref().unwrap_or("None"));
        println!("  Error: {}", failure.error);
    }

    let verdict = session.verdict();
    println!("{}", "=".repeat(60));
    println!("Session {}: {}", session.id, verdict);
    if let Some(reason) = verdict.reason() {
        println!("  {}", reason);
    }
    println!("Backends seen ({}): {}", session.field, session.backends().join(", "));

    println!();
    println!("ANALYSIS:");
    println!("- Different backends between requests -> session affinity broken");
    println!("- 'not found' on a continuation -> previous response lives on another backend");
    println!("- All requests on one backend -> session affinity working");
    println!("- Missing routing headers -> gateway policy does not expose them; result is indeterminate");
}
