//! # Demo: socket echo with a single-in-flight write backend.
//!
//! Shows inbound frame delivery, the send gate serializing back-to-back
//! sends, and exactly-once close. Run with:
//!
//! ```text
//! cargo run --example ws_echo --features mock
//! ```

use bytes::Bytes;
use gangway::{Frame, MockSocketTransport, ServerWebSocket};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    // This backend tolerates one in-flight write; completions are reported
    // explicitly, the way an adapter's completion callback would.
    let backend = MockSocketTransport::single_flight();
    let socket = ServerWebSocket::new("/chat", backend.boxed());

    let echoer = socket.clone();
    socket.text_action(move |text| {
        println!("inbound text: {text:?}");
        echoer.send(format!("echo: {text}"));
    });
    socket.binary_action(|data| println!("inbound binary: {data:?}"));
    socket.close_action(|| println!("socket closed"));

    // Two inbound frames produce two queued echoes; only the first hits
    // the wire until its completion is reported.
    socket.handle_frame(Frame::Text("x".into()));
    socket.handle_frame(Frame::Text("y".into()));
    socket.handle_frame(Frame::Binary(Bytes::from_static(&[1, 2, 3])));
    println!("on the wire so far: {:?}", backend.calls());

    socket.handle_send_result(Ok(()));
    socket.handle_send_result(Ok(()));
    println!("after completions:  {:?}", backend.calls());

    // Local close and the backend's confirmation; close fires once.
    socket.close();
    socket.handle_close();
}
