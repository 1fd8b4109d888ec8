use std::sync::Arc;
use std::time::Duration;

use agent_invoke_harness::vendors::http::{HttpAgentService, HttpServiceConfig};
use agent_invoke_harness::{AgentOptions, HarnessError, Invoker};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), HarnessError> {
    let config = HttpServiceConfig::resolve(None, None)?.connect_timeout(Duration::from_secs(5));
    let service = HttpAgentService::new(config)?;
    let invoker = Invoker::new(Arc::new(service));

    let options = AgentOptions {
        agent_id: std::env::var("AGENT_ID").unwrap_or_default(),
        agent_alias_id: std::env::var("AGENT_ALIAS_ID").unwrap_or_default(),
        input_text: "Stream a short greeting.".into(),
        streaming: true,
        ..AgentOptions::default()
    }
    .validate()?;

    let mut stdout = std::io::stdout();
    invoker.run(&options, &mut stdout).await?;
    Ok(())
}
