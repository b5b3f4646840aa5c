//! src/platforms/twitch_irc/client.rs

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, split};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use tokio_native_tls::native_tls;
use tokio_native_tls::TlsConnector;
use tracing::{info, error, debug};

pub const TWITCH_IRC_HOST: &str = "irc.chat.twitch.tv";
pub const TWITCH_IRC_TLS_PORT: u16 = 6697;

/// Minimal representation of a parsed IRC message from Twitch.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTwitchMsg {
    pub tags: Option<String>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
    pub trailing: Option<String>,
}

impl ParsedTwitchMsg {
    pub fn parse_irc_line(line: &str) -> Self {
        let mut rest = line.trim();
        let mut tags = None;
        let mut prefix = None;
        let mut params = Vec::new();
        let mut trailing = None;

        if let Some(stripped) = rest.strip_prefix('@') {
            match stripped.find(' ') {
                Some(space_pos) => {
                    tags = Some(rest[..space_pos + 1].to_string());
                    rest = &stripped[space_pos + 1..];
                }
                None => {
                    return Self {
                        tags: Some(rest.to_string()),
                        prefix: None,
                        command: String::new(),
                        params,
                        trailing,
                    };
                }
            }
        }

        if let Some(stripped) = rest.strip_prefix(':') {
            match stripped.find(' ') {
                Some(space_pos) => {
                    prefix = Some(stripped[..space_pos].to_string());
                    rest = &stripped[space_pos + 1..];
                }
                None => {
                    return Self {
                        tags,
                        prefix: Some(stripped.to_string()),
                        command: String::new(),
                        params,
                        trailing,
                    };
                }
            }
        }

        let mut parts = rest.splitn(2, ' ');
        let command = parts.next().unwrap_or("").to_string();
        rest = parts.next().unwrap_or("");

        if let Some(stripped) = rest.strip_prefix(':') {
            trailing = Some(stripped.to_string());
        } else if let Some(idx) = rest.find(" :") {
            trailing = Some(rest[idx + 2..].to_string());
            params.extend(rest[..idx].split_whitespace().map(|s| s.to_string()));
        } else {
            params.extend(rest.split_whitespace().map(|s| s.to_string()));
        }

        Self { tags, prefix, command, params, trailing }
    }

    /// Nick part of `nick!user@host`.
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        prefix.find('!').map(|excl| &prefix[..excl])
    }
}

/// Higher-level event from the IRC read loop.
#[derive(Debug, Clone, PartialEq)]
pub struct IrcIncomingEvent {
    pub command: String,
    pub channel: Option<String>,
    pub user_name: Option<String>,
    pub user_id: Option<String>,
    pub text: Option<String>,
}

impl IrcIncomingEvent {
    /// Builds the event for a parsed line. PING is answered in the read loop
    /// and never turned into an event.
    pub fn from_parsed(parsed: &ParsedTwitchMsg) -> Self {
        let command = parsed.command.to_uppercase();
        let mut evt = IrcIncomingEvent {
            command: command.clone(),
            channel: None,
            user_name: None,
            user_id: None,
            text: None,
        };

        match command.as_str() {
            "PRIVMSG" => {
                evt.channel = parsed.params.first().cloned();
                evt.text = parsed.trailing.clone();
                evt.user_name = parsed.nick().map(str::to_string);
                if let Some(t) = &parsed.tags {
                    evt.user_id = extract_tag_value(t, "user-id");
                    if let Some(dn) = extract_tag_value(t, "display-name").filter(|d| !d.is_empty()) {
                        evt.user_name = Some(dn);
                    }
                }
            }
            "JOIN" | "PART" => {
                evt.channel = parsed.params.first().cloned();
                evt.user_name = parsed.nick().map(str::to_string);
            }
            _ => {}
        }
        evt
    }
}

/// Low-level IRC client that connects to Twitch via TLS.
pub struct TwitchIrcClient {
    raw_outgoing: mpsc::UnboundedSender<String>,

    /// Taken once by whoever consumes the read side.
    pub incoming: Option<mpsc::UnboundedReceiver<IrcIncomingEvent>>,

    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl TwitchIrcClient {
    /// Connects to `irc.chat.twitch.tv:6697` with TLS and starts the session.
    pub async fn connect(username: &str, oauth_token: &str) -> io::Result<Self> {
        let tcp = TcpStream::connect((TWITCH_IRC_HOST, TWITCH_IRC_TLS_PORT))
            .await
            .map_err(|e| io::Error::other(format!("TCP connect error: {e}")))?;

        let native_connector = native_tls::TlsConnector::new()
            .map_err(|e| io::Error::other(format!("TLSConnector::new() => {e}")))?;
        let connector = TlsConnector::from(native_connector);

        let tls_stream = connector
            .connect(TWITCH_IRC_HOST, tcp)
            .await
            .map_err(|e| io::Error::other(format!("TLS connect() => {e}")))?;

        let (read_half, write_half) = split(tls_stream);
        Ok(Self::start(read_half, write_half, username, oauth_token))
    }

    /// Sends PASS/NICK/CAP over an already open stream and spawns the
    /// read/write tasks.
    pub fn start<R, W>(read_half: R, write_half: W, username: &str, oauth_token: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx_outgoing, rx_outgoing) = mpsc::unbounded_channel::<String>();
        let (tx_incoming, rx_incoming) = mpsc::unbounded_channel::<IrcIncomingEvent>();

        let write_task = tokio::spawn(Self::writer_loop(write_half, rx_outgoing));

        tx_outgoing.send(format!("PASS {}", oauth_token)).ok();
        tx_outgoing.send(format!("NICK {}", username)).ok();
        tx_outgoing
            .send("CAP REQ :twitch.tv/commands twitch.tv/tags twitch.tv/membership".to_string())
            .ok();

        let read_task = tokio::spawn(Self::reader_loop(
            read_half,
            tx_incoming,
            tx_outgoing.clone(),
        ));

        Self {
            raw_outgoing: tx_outgoing,
            incoming: Some(rx_incoming),
            read_task,
            write_task,
        }
    }

    async fn reader_loop<R>(
        read_half: R,
        tx_incoming: mpsc::UnboundedSender<IrcIncomingEvent>,
        tx_outgoing: mpsc::UnboundedSender<String>,
    )
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(read_half);
        let mut line_buffer = String::new();

        loop {
            line_buffer.clear();
            match reader.read_line(&mut line_buffer).await {
                Ok(0) => {
                    info!("(TwitchIrcClient) read_loop => EOF");
                    break;
                }
                Ok(_) => {
                    let line = line_buffer.trim_end();
                    if line.is_empty() {
                        continue;
                    }
                    debug!("<< {}", line);

                    let parsed = ParsedTwitchMsg::parse_irc_line(line);
                    if parsed.command.eq_ignore_ascii_case("PING") {
                        let payload = parsed.trailing.as_deref().unwrap_or("tmi.twitch.tv");
                        tx_outgoing.send(format!("PONG :{}", payload)).ok();
                        debug!("Auto PONG -> {}", payload);
                        continue;
                    }

                    let evt = IrcIncomingEvent::from_parsed(&parsed);
                    let reconnect = evt.command == "RECONNECT";
                    if tx_incoming.send(evt).is_err() {
                        break;
                    }
                    // Twitch is about to drop this connection.
                    if reconnect {
                        info!("(TwitchIrcClient) server asked us to reconnect");
                        break;
                    }
                }
                Err(e) => {
                    error!("(TwitchIrcClient) read error => {:?}", e);
                    break;
                }
            }
        }

        info!("(TwitchIrcClient) reader_loop ended.");
    }

    async fn writer_loop<W>(
        mut write_half: W,
        mut rx_outgoing: mpsc::UnboundedReceiver<String>,
    )
    where
        W: AsyncWrite + Unpin,
    {
        let mut writer = BufWriter::new(&mut write_half);

        while let Some(line) = rx_outgoing.recv().await {
            if line.starts_with("PASS ") {
                debug!(">> PASS (redacted)");
            } else {
                debug!(">> {}", line);
            }
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                error!("writer error => {:?}", e);
                break;
            }
            if let Err(e) = writer.write_all(b"\r\n").await {
                error!("writer error => {:?}", e);
                break;
            }
            if let Err(e) = writer.flush().await {
                error!("writer flush error => {:?}", e);
                break;
            }
        }

        info!("(TwitchIrcClient) writer_loop ended.");
    }

    /// Returns false once the writer task has gone away.
    pub fn send_raw_line(&self, line: &str) -> bool {
        self.raw_outgoing.send(line.to_string()).is_ok()
    }

    pub fn join_channel(&self, channel: &str) -> bool {
        self.send_raw_line(&format!("JOIN {}", channel))
    }

    pub fn part_channel(&self, channel: &str) -> bool {
        self.send_raw_line(&format!("PART {}", channel))
    }

    pub fn send_privmsg(&self, channel: &str, message: &str) -> bool {
        self.send_raw_line(&format!("PRIVMSG {} :{}", channel, message))
    }

    pub fn shutdown(self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

/// Helper to extract `key=value` from a tag string like `@badge-info=;user-id=1234;...`
pub fn extract_tag_value(tag_str: &str, key: &str) -> Option<String> {
    tag_str
        .trim()
        .trim_start_matches('@')
        .split(';')
        .find_map(|kv| {
            let (left, right) = kv.split_once('=').unwrap_or((kv, ""));
            (left == key).then(|| right.to_string())
        })
}
