//! Two channels talking over an in-memory stream pair: a minimal adapter
//! that answers `threads` and emits a `stopped` event, and a client that
//! drives it.
//!
//! Run with `cargo run --example loopback`.

use dapwire::channel::{
    Channel, ChannelConfig, HandlerSet, IncomingEvent, IncomingRequest, Outcome,
};
use dapwire::logging::{init_logging, LogFormat, LogLevel};
use dapwire::schema::{Datatype, MessageSchemas, Simple};
use dapwire::transport::DapStream;
use serde_json::json;

fn main() {
    init_logging(LogFormat::Text, LogLevel::Debug);

    let schemas = MessageSchemas::builder()
        .response("threads", Datatype::array(Datatype::Simple(Simple::Int)))
        .event(
            "stopped",
            Datatype::choices(Simple::Str, ["step", "breakpoint", "pause"]),
        )
        .build();

    let (client_stream, adapter_stream) = DapStream::pair();

    let adapter_handlers = HandlerSet::new()
        .on_request("threads", |_: &IncomingRequest| {
            Outcome::Respond(Some(json!([1, 2])))
        })
        .on_any_request(|request: &IncomingRequest| {
            Outcome::Fail(format!("unsupported command {:?}", request.command()))
        });
    let adapter = Channel::start(
        adapter_stream,
        adapter_handlers,
        ChannelConfig {
            name: "adapter".to_owned(),
            schemas: schemas.clone(),
            ..ChannelConfig::default()
        },
    )
    .expect("start adapter channel");

    let client_handlers = HandlerSet::new().on_event("stopped", |event: &IncomingEvent| {
        println!("stopped: {:?}", event.body);
    });
    let client = Channel::start(
        client_stream,
        client_handlers,
        ChannelConfig {
            name: "client".to_owned(),
            schemas,
            ..ChannelConfig::default()
        },
    )
    .expect("start client channel");

    let threads = client
        .send_request("threads", None)
        .expect("send threads request")
        .wait();
    println!("threads: {:?}", threads.body);

    let failed = client
        .send_request("restart", None)
        .expect("send restart request")
        .wait();
    println!("restart refused: {:?}", failed.message);

    adapter
        .send_event("stopped", Some(json!("breakpoint")))
        .expect("send stopped event");

    adapter.close().expect("close adapter");
    client.join();
}
