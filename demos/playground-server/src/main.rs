//! Live playground served to a browser.
//!
//! Run with: cargo run -p playground-server -- [config.json] [addr]
//!
//! Then open http://localhost:3000 in your browser.

use std::{net::SocketAddr, path::PathBuf};

use anyhow::Context as _;
use axum::{Router, response::Html, routing::get};
use clap::Parser;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use playground_core::{Fragments, PlaygroundConfig};
use playground_host::start_host;
use playground_transport::websocket::create_ws_router;

const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Live playground server
#[derive(Parser, Debug)]
#[command(name = "playground-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON configuration file; defaults apply when omitted
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(default_value = DEFAULT_ADDR)]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PlaygroundConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PlaygroundConfig::default(),
    };
    let addr = args.addr;

    let host = start_host(config, starter_fragments()).context("Failed to start host")?;

    let app = Router::new()
        .route("/", get(index_handler))
        .merge(create_ws_router(host))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Playground listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn starter_fragments() -> Fragments {
    Fragments {
        script: STARTER_SCRIPT.to_string(),
        style: STARTER_STYLE.to_string(),
        markup: STARTER_MARKUP.to_string(),
    }
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const STARTER_MARKUP: &str = r#"<main>
  <div id="root"></div>
</main>"#;

const STARTER_STYLE: &str = r"h1 { font-family: system-ui, sans-serif; color: teal; }
li { margin: 4px 0; }";

const STARTER_SCRIPT: &str = r#"type Item = { label: string, done: boolean }

local items: { Item } = {
  { label = "write markup", done = true },
  { label = "add a stylesheet", done = true },
  { label = "render from script", done = false },
}

local function Row(props: { item: Item })
  local mark = props.item.done and "[x] " or "[ ] "
  return <li>{mark}{props.item.label}</li>
end

local Badge = styled("span")("padding: 2px 6px; background: #eee;")

local rows = {}
for i, item in ipairs(items) do
  rows[i] = <Row item={item} />
end

console.log("rendering", #items, "items")
UIDom.render(
  <>
    <h1>Checklist <Badge>{#items}</Badge></h1>
    <ul>{rows}</ul>
  </>,
  document.getElementById("root")
)
"#;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Live Playground</title>
    <style>
        body {
            margin: 0;
            padding: 16px;
            background: #1e1e1e;
            color: #d4d4d4;
            font-family: system-ui, sans-serif;
        }
        .toolbar { margin-bottom: 8px; display: flex; gap: 12px; align-items: center; }
        .panes { display: grid; grid-template-columns: 1fr 1fr 1fr; gap: 8px; }
        textarea {
            width: 100%;
            height: 260px;
            background: #111;
            color: #d4d4d4;
            font-family: Menlo, Monaco, "Courier New", monospace;
            font-size: 13px;
            box-sizing: border-box;
        }
        .bottom { display: grid; grid-template-columns: 2fr 1fr; gap: 8px; margin-top: 8px; }
        iframe { width: 100%; height: 320px; background: #fff; border: 0; }
        #console { height: 320px; overflow: auto; font-family: monospace; font-size: 12px; margin: 0; padding: 0; }
        #console li { list-style: none; padding: 2px 4px; border-bottom: 1px solid #333; }
        .warn { color: #dc4; }
        .error, .compile { color: #e66; }
        .status { color: #888; }
    </style>
</head>
<body>
    <div class="toolbar">
        <label><input type="checkbox" id="autorun"> Autorun</label>
        <button id="run">Run</button>
        <button id="reload">Reload</button>
        <span class="status" id="status">Connecting...</span>
    </div>
    <div class="panes">
        <textarea id="markup" spellcheck="false"></textarea>
        <textarea id="style" spellcheck="false"></textarea>
        <textarea id="script" spellcheck="false"></textarea>
    </div>
    <div class="bottom">
        <iframe id="preview"></iframe>
        <ul id="console"></ul>
    </div>

    <script>
        const panes = ['markup', 'style', 'script'];
        const status = document.getElementById('status');
        const consoleList = document.getElementById('console');
        const preview = document.getElementById('preview');
        const autorun = document.getElementById('autorun');
        let ws;
        let snapshotTimer;

        function send(msg) {
            if (ws && ws.readyState === WebSocket.OPEN) {
                ws.send(JSON.stringify(msg));
            }
        }

        function requestSnapshot() {
            clearTimeout(snapshotTimer);
            snapshotTimer = setTimeout(() => send({ type: 'snapshot' }), 150);
        }

        function connect() {
            const protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
            ws = new WebSocket(`${protocol}//${window.location.host}/ws`);

            ws.onopen = () => {
                status.textContent = 'Connected';
                requestSnapshot();
            };

            ws.onclose = () => {
                status.textContent = 'Disconnected - reconnecting...';
                setTimeout(connect, 2000);
            };

            ws.onmessage = (event) => {
                const msg = JSON.parse(event.data);
                if (msg.type === 'state') {
                    for (const pane of panes) {
                        document.getElementById(pane).value = msg.fragments[pane];
                    }
                    autorun.checked = msg.autorun;
                } else if (msg.type === 'log') {
                    const li = document.createElement('li');
                    li.className = msg.channel;
                    li.textContent = msg.args.join(' ');
                    consoleList.appendChild(li);
                    requestSnapshot();
                } else if (msg.type === 'cleared') {
                    consoleList.replaceChildren();
                } else if (msg.type === 'snapshot') {
                    preview.srcdoc = `<style>${msg.stylesheet}\n${msg.styled_css}</style>${msg.body_html}`;
                } else if (msg.type === 'error') {
                    status.textContent = msg.message;
                }
            };
        }

        for (const pane of panes) {
            document.getElementById(pane).addEventListener('input', (e) => {
                send({ type: 'edit', fragment: pane, text: e.target.value });
                requestSnapshot();
            });
        }
        autorun.addEventListener('change', () => {
            send({ type: 'set_autorun', enabled: autorun.checked });
            requestSnapshot();
        });
        document.getElementById('run').addEventListener('click', () => {
            send({ type: 'run' });
            requestSnapshot();
        });
        document.getElementById('reload').addEventListener('click', () => {
            send({ type: 'reload' });
            requestSnapshot();
        });

        connect();
    </script>
</body>
</html>
"#;
