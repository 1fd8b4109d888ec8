use agent_invoke_harness::{
    EventStream, OutputFormat, StreamEvent, StreamReducer, TextEcho,
};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let mut events = EventStream::from_results(vec![
        Ok(StreamEvent::TextChunk {
            bytes: b"Hello, ".to_vec(),
            citations: Vec::new(),
        }),
        Ok(StreamEvent::TextChunk {
            bytes: b"world!".to_vec(),
            citations: Vec::new(),
        }),
    ]);

    let mut echo = TextEcho::new(std::io::stdout());
    match StreamReducer::new(OutputFormat::Text)
        .with_echo(&mut echo)
        .reduce(&mut events)
        .await
    {
        Ok(result) => println!("\n{} bytes reduced", result.content.len()),
        Err(failure) => eprintln!(
            "stream failed after {} bytes: {}",
            failure.partial.content.len(),
            failure.error
        ),
    }
}
