//! Example demonstrating futures Stream/Sink adapters
//!
//! Shows how to use zlink sockets with futures ecosystem tools
//! like StreamExt and SinkExt.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use zlink_proto::adapters::{SocketSink, SocketStream};
use zlink_proto::{DealerSocket, RouterSocket};
use std::time::Duration;

// Note: This example requires implementing RecvSocket and SendSocket traits
// for the socket types. This is a demonstration of the API design.

#[compio::main]
async fn main() -> std::io::Result<()> {
    println!("Stream/Sink Adapter Example");
    println!("============================\n");

    // Example 1: Using Stream for receiving
    println!("Example 1: Stream adapter");
    println!("--------------------------");
    
    // In a real implementation, sockets would implement RecvSocket/SendSocket
    println!("Design: Wrap any socket with SocketStream to use StreamExt methods:");
    println!("  let stream = SocketStream::new(socket);");
    println!("  stream.take(10).for_each(|msg| ...).await;");
    println!();

    // Example 2: Using Sink for sending
    println!("Example 2: Sink adapter");
    println!("-----------------------");
    println!("Design: Wrap any socket with SocketSink to use SinkExt methods:");
    println!("  let sink = SocketSink::new(socket);");
    println!("  sink.send(message).await?;");
    println!("  sink.send_all(&mut stream).await?;");
    println!();

    // Example 3: Stream combinators
    println!("Example 3: Stream combinators");
    println!("------------------------------");
    println!("Design: Use standard Stream methods for filtering/mapping:");
    println!("  stream");
    println!("    .filter(|msg| future::ready(is_valid(msg)))");
    println!("    .map(|msg| transform(msg))");
    println!("    .take(100)");
    println!("    .for_each(|msg| process(msg))");
    println!("    .await;");
    println!();

    // Example 4: Forwarding between sockets
    println!("Example 4: Forwarding with Stream/Sink");
    println!("---------------------------------------");
    println!("Design: Forward messages from one socket to another:");
    println!("  let input_stream = SocketStream::new(input_socket);");
    println!("  let mut output_sink = SocketSink::new(output_socket);");
    println!("  output_sink.send_all(&mut input_stream).await?;");
    println!();

    println!("Note: Full implementation requires implementing RecvSocket and");
    println!("SendSocket traits for each socket type with proper async/await");
    println!("support using compio runtime.");

    Ok(())
}
