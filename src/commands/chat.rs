use std::io::Write;

use anyhow::Error;
use futures_util::StreamExt;

use crate::args::ChatSubCommand;
use crate::clients::gaia::stream::create_streaming_chat_completion;
use crate::clients::gaia::{HttpTransport, ProviderConfig};
use crate::models::chat_request::ChatCompletionRequest;
use crate::models::Message;
use crate::services::errors::{classify, user_message};

/// One-shot streaming chat from the terminal, mostly useful for checking a
/// node credential and watching the relay's decode path live.
pub async fn run(cmd: ChatSubCommand) -> Result<(), Error> {
    let transport = HttpTransport::new();
    let provider = ProviderConfig::from_settings();

    let mut request = ChatCompletionRequest::new(vec![Message {
        role: "user".to_string(),
        content: cmd.prompt,
    }]);
    request.model = cmd.model;

    let mut stream = match create_streaming_chat_completion(&transport, &provider, &request).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("{}", user_message(classify(&e)));
            return Err(e.into());
        }
    };
    let mut stdout = std::io::stdout();
    while let Some(event) = stream.next().await {
        let event = event?;
        if let Some(delta) = event
            .pointer("/choices/0/delta/content")
            .and_then(|v| v.as_str())
        {
            print!("{}", delta);
            stdout.flush()?;
        }
    }
    println!();
    Ok(())
}
