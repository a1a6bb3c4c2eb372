//! # Demo: HTTP echo over the scripted mock backend.
//!
//! Shows the full life of one exchange: the backend delivers a text body,
//! the application echoes it back, and close fires once both directions
//! have settled. Run with:
//!
//! ```text
//! cargo run --example http_echo --features mock
//! ```

use gangway::{MockHttpTransport, Payload, RequestHead, ServerHttpExchange};
use http::{HeaderMap, HeaderValue, Method};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    let head = RequestHead::new(Method::POST, "/echo", headers);

    // One handle stays with "the backend" for scripting and inspection,
    // the boxed clone goes to the exchange.
    let backend = MockHttpTransport::new();
    let exchange = ServerHttpExchange::new(head, backend.boxed());

    let responder = exchange.clone();
    exchange.body_action(move |body: &Payload| {
        let text = body.as_text().unwrap_or("<binary>");
        println!("request body: {text:?}");
        responder
            .set_header("content-type", "text/plain; charset=utf-8")
            .expect("headers are still open");
        responder.end_with(&format!("echo: {text}"));
    });
    exchange.close_action(|| println!("exchange closed"));

    // The backend delivers the body; a real adapter would do this from
    // native callbacks.
    let feed = backend.feed().expect("body_action triggered the read");
    feed.chunk(&b"hel"[..]);
    feed.chunk(&b"lo"[..]);
    feed.end();

    println!("delegated calls: {:#?}", backend.calls());
}
