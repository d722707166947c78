// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `pagebridge open`: a tao window hosting a wry webview with a live bridge.
//
// The page can call `window.<namespace>.call("add", 2, 3)` or
// `window.<namespace>.exposed.sleep(500)`; once the runtime reports ready,
// native sets the document title through `evaluate`.

use std::sync::Arc;
use std::time::Duration;

use pagebridge_core::error::{BridgeError, Result};
use pagebridge_engine::webview::{UserEvent, WryEngine};
use pagebridge_rpc::{BridgeConfig, BridgeSession, Responder};
use tao::event::{Event, WindowEvent};
use tao::event_loop::{ControlFlow, EventLoopBuilder};
use tao::window::WindowBuilder;
use tracing::{info, warn};
use wry::WebViewBuilder;

pub fn open(url: &str, config: BridgeConfig) -> Result<bool> {
    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();
    let window = WindowBuilder::new()
        .with_title("Pagebridge")
        .build(&event_loop)
        .map_err(|e| BridgeError::Engine(format!("window: {e}")))?;

    let engine = Arc::new(WryEngine::new(&event_loop));
    // Built before `attach`, so the runtime goes in as an initialization script.
    let session = BridgeSession::builder(engine.clone()).config(config).build()?;
    expose_demo(&session)?;

    let greeter = session.clone();
    session.on_ready(move || greet(&greeter));

    let builder = engine.attach(WebViewBuilder::new().with_url(url));

    #[cfg(target_os = "linux")]
    let webview = {
        use tao::platform::unix::WindowExtUnix;
        use wry::WebViewBuilderExtUnix;
        builder.build_gtk(window.gtk_window())
    };
    #[cfg(not(target_os = "linux"))]
    let webview = builder.build(&window);

    let webview = webview.map_err(|e| BridgeError::Engine(format!("webview: {e}")))?;
    info!(%url, session = %session.id(), "window open");

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;
        let _ = &window;

        match event {
            Event::UserEvent(user_event) => engine.handle_event(&webview, user_event),
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                session.close();
                engine.mark_closed();
                *control_flow = ControlFlow::Exit;
            }
            _ => {}
        }
    })
}

fn expose_demo(session: &BridgeSession) -> Result<()> {
    session.expose("add", |a: f64, b: f64| a + b, false)?;
    session.expose_deferred(
        "sleep",
        |ms: u64, responder: Responder| {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(ms));
                responder.resolve(ms);
            });
        },
        false,
    )?;
    Ok(())
}

fn greet(session: &BridgeSession) {
    let pending = session.evaluate::<String>(
        "(document.title = {})",
        ("Hello from native",),
    );
    match pending {
        Ok(pending) => {
            std::thread::spawn(move || match pending.wait() {
                Ok(title) => info!(%title, "page title set"),
                Err(e) => warn!(error = %e, "greeting failed"),
            });
        }
        Err(e) => warn!(error = %e, "greeting not sent"),
    }
}
