//! 재접속을 관리하는 클라이언트 세션 루프
//!
//! 프로세스당 하나의 연결을 유지하고 방 멤버십은 데이터로만 다룬다.
//! 끊긴 동안 들어온 방 합류 요청은 정확히 하나만 대기열에 남겨 두었다가
//! 다음 연결이 열리는 즉시 방출한다.

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream};

use crate::config::ReconnectConfig;
use crate::protocol::{
    ClientMessage, DebateVote, ModeratorActionKind, RoomKind, ServerMessage, StrawVote,
};
use crate::time::unix_ms;

use super::adapter::RoomStateAdapter;
use super::connection::{is_terminal_close, ConnectionState, ReconnectPolicy};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// 클라이언트 세션 오류
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed after {0} attempts")]
    RetriesExhausted(u32),
}

/// 세션 설정
#[derive(Debug, Clone)]
pub struct ClientSessionConfig {
    /// 예: ws://127.0.0.1:5610/ws
    pub url: String,
    pub user_id: String,
    pub reconnect: ReconnectConfig,
}

/// UI/CLI에서 세션 루프로 보내는 명령
#[derive(Debug, Clone)]
pub enum ClientCommand {
    Join {
        room_id: String,
        kind: Option<RoomKind>,
        as_moderator: bool,
    },
    Leave,
    Chat {
        room_id: String,
        content: String,
    },
    StrawPoll {
        room_id: String,
        vote: StrawVote,
    },
    Vote {
        room_id: String,
        vote: DebateVote,
    },
    Moderate {
        room_id: String,
        action: ModeratorActionKind,
        target: Option<String>,
    },
    Shutdown,
}

#[derive(Debug, Clone)]
struct PendingJoin {
    room_id: String,
    kind: Option<RoomKind>,
    as_moderator: bool,
}

enum LoopExit {
    /// 명령으로 내려진 종료
    Shutdown,
    /// 재접속하지 않는 종료 코드 수신
    Terminal,
    /// 일시 장애, 백오프 후 재접속
    Transient,
}

#[derive(PartialEq)]
enum WaitExit {
    Elapsed,
    Shutdown,
}

/// 클라이언트 세션 실행
///
/// 수신한 서버 메시지는 어댑터에 반영한 뒤 이벤트 채널로 흘려 보낸다.
/// 재접속 상한을 넘으면 connection_state를 error로 만들고 반환한다.
pub async fn run_client_session(
    config: ClientSessionConfig,
    mut adapter: RoomStateAdapter,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
    events: mpsc::UnboundedSender<ServerMessage>,
) -> Result<(), ClientError> {
    let policy = ReconnectPolicy::new(&config.reconnect);
    let url = format!("{}?user_id={}", config.url, config.user_id);
    let mut pending_join: Option<PendingJoin> = None;
    let mut attempt: u32 = 0;

    loop {
        adapter.set_connection_state(ConnectionState::Connecting);
        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                tracing::info!(user_id = %config.user_id, "Connected to session server");
                attempt = 0;
                adapter.set_connection_state(ConnectionState::Open);

                let exit = drive(
                    stream,
                    &mut adapter,
                    &mut commands,
                    &events,
                    &mut pending_join,
                )
                .await;
                match exit {
                    LoopExit::Shutdown | LoopExit::Terminal => {
                        adapter.set_connection_state(ConnectionState::Closed);
                        return Ok(());
                    }
                    LoopExit::Transient => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Connection attempt failed");
            }
        }

        attempt += 1;
        let Some(delay) = policy.jittered_delay(attempt) else {
            tracing::error!(
                attempts = policy.max_attempts(),
                "Reconnect attempts exhausted"
            );
            adapter.set_connection_state(ConnectionState::Error);
            return Err(ClientError::RetriesExhausted(policy.max_attempts()));
        };

        tracing::info!(
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        adapter.set_connection_state(ConnectionState::Closed);
        if wait_and_queue(delay, &mut commands, &mut pending_join).await == WaitExit::Shutdown {
            return Ok(());
        }
    }
}

/// 열린 연결 위에서 명령과 서버 프레임을 처리
async fn drive(
    stream: WsStream,
    adapter: &mut RoomStateAdapter,
    commands: &mut mpsc::UnboundedReceiver<ClientCommand>,
    events: &mpsc::UnboundedSender<ServerMessage>,
    pending_join: &mut Option<PendingJoin>,
) -> LoopExit {
    let (mut write, mut read) = stream.split();

    // 끊긴 동안 대기하던 합류 요청을 즉시 방출
    if let Some(join) = pending_join.take() {
        let msg = ClientMessage::JoinRoom {
            room_id: join.room_id,
            user_id: None,
            kind: join.kind,
            as_moderator: join.as_moderator,
        };
        if send_message(&mut write, &msg).await.is_err() {
            return LoopExit::Transient;
        }
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if send_message(&mut write, &ClientMessage::Heartbeat).await.is_err() {
                    return LoopExit::Transient;
                }
            }
            cmd = commands.recv() => match cmd {
                None | Some(ClientCommand::Shutdown) => {
                    adapter.set_connection_state(ConnectionState::Closing);
                    let _ = write.send(Message::Close(None)).await;
                    return LoopExit::Shutdown;
                }
                Some(ClientCommand::Leave) => {
                    adapter.reset_room();
                    if send_message(&mut write, &ClientMessage::LeaveRoom).await.is_err() {
                        return LoopExit::Transient;
                    }
                }
                Some(cmd) => {
                    if let Some(msg) = command_to_message(cmd) {
                        if send_message(&mut write, &msg).await.is_err() {
                            return LoopExit::Transient;
                        }
                    }
                }
            },
            frame = read.next() => match handle_frame(frame, adapter, events) {
                FrameOutcome::Continue => {}
                FrameOutcome::Exit(exit) => return exit,
            },
        }
    }
}

enum FrameOutcome {
    Continue,
    Exit(LoopExit),
}

fn handle_frame(
    frame: Option<Result<Message, tokio_tungstenite::tungstenite::Error>>,
    adapter: &mut RoomStateAdapter,
    events: &mpsc::UnboundedSender<ServerMessage>,
) -> FrameOutcome {
    match frame {
        Some(Ok(Message::Text(text))) => {
            match serde_json::from_str::<ServerMessage>(&text) {
                Ok(msg) => {
                    adapter.apply(&msg);
                    let _ = events.send(msg);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropped unparseable server message");
                }
            }
            FrameOutcome::Continue
        }
        Some(Ok(Message::Close(frame))) => {
            // close code 없는 비정상 종료는 1006으로 취급
            let code = frame.map(|f| u16::from(f.code)).unwrap_or(1006);
            if is_terminal_close(code) {
                tracing::info!(code = code, "Server closed the connection");
                FrameOutcome::Exit(LoopExit::Terminal)
            } else {
                tracing::warn!(code = code, "Connection dropped");
                FrameOutcome::Exit(LoopExit::Transient)
            }
        }
        Some(Ok(_)) => FrameOutcome::Continue,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "WebSocket read error");
            FrameOutcome::Exit(LoopExit::Transient)
        }
        None => FrameOutcome::Exit(LoopExit::Transient),
    }
}

/// 백오프 대기 중 명령 채널을 계속 비운다
///
/// 합류 요청은 마지막 것 하나만 대기열에 남고, 전송이 필요한 다른
/// 명령은 연결이 없으므로 경고와 함께 버린다.
async fn wait_and_queue(
    delay: Duration,
    commands: &mut mpsc::UnboundedReceiver<ClientCommand>,
    pending_join: &mut Option<PendingJoin>,
) -> WaitExit {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return WaitExit::Elapsed,
            cmd = commands.recv() => match cmd {
                None | Some(ClientCommand::Shutdown) => return WaitExit::Shutdown,
                Some(ClientCommand::Join { room_id, kind, as_moderator }) => {
                    *pending_join = Some(PendingJoin { room_id, kind, as_moderator });
                }
                Some(other) => {
                    tracing::warn!(command = ?other, "Dropped command while disconnected");
                }
            }
        }
    }
}

/// 명령을 와이어 메시지로 변환 (Shutdown은 메시지가 아님)
fn command_to_message(cmd: ClientCommand) -> Option<ClientMessage> {
    match cmd {
        ClientCommand::Join {
            room_id,
            kind,
            as_moderator,
        } => Some(ClientMessage::JoinRoom {
            room_id,
            user_id: None,
            kind,
            as_moderator,
        }),
        ClientCommand::Leave => Some(ClientMessage::LeaveRoom),
        ClientCommand::Chat { room_id, content } => Some(ClientMessage::ChatMessage {
            room_id,
            content,
            timestamp: Some(unix_ms()),
        }),
        ClientCommand::StrawPoll { room_id, vote } => {
            Some(ClientMessage::LiveVote { room_id, vote })
        }
        ClientCommand::Vote { room_id, vote } => Some(ClientMessage::SubmitVote { room_id, vote }),
        ClientCommand::Moderate {
            room_id,
            action,
            target,
        } => Some(ClientMessage::ModeratorAction {
            room_id,
            action,
            target,
        }),
        ClientCommand::Shutdown => None,
    }
}

async fn send_message(write: &mut WsSink, msg: &ClientMessage) -> Result<(), ()> {
    let Ok(json) = serde_json::to_string(msg) else {
        return Ok(());
    };
    write.send(Message::Text(json)).await.map_err(|e| {
        tracing::warn!(error = %e, "Failed to send message");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_command_carries_timestamp() {
        let msg = command_to_message(ClientCommand::Chat {
            room_id: "r1".to_string(),
            content: "hello".to_string(),
        });
        match msg {
            Some(ClientMessage::ChatMessage {
                room_id, timestamp, ..
            }) => {
                assert_eq!(room_id, "r1");
                assert!(timestamp.is_some());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn shutdown_is_not_a_wire_message() {
        assert!(command_to_message(ClientCommand::Shutdown).is_none());
    }

    #[tokio::test]
    async fn backoff_wait_keeps_single_pending_join() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pending = None;

        tx.send(ClientCommand::Join {
            room_id: "r1".to_string(),
            kind: Some(RoomKind::Debate),
            as_moderator: false,
        })
        .unwrap();
        tx.send(ClientCommand::Join {
            room_id: "r2".to_string(),
            kind: Some(RoomKind::Debate),
            as_moderator: false,
        })
        .unwrap();

        let exit = wait_and_queue(Duration::from_millis(20), &mut rx, &mut pending).await;
        assert!(exit == WaitExit::Elapsed);
        // 마지막 합류 요청 하나만 남는다
        assert_eq!(pending.unwrap().room_id, "r2");
    }

    #[tokio::test]
    async fn shutdown_interrupts_backoff_wait() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pending = None;
        tx.send(ClientCommand::Shutdown).unwrap();

        let exit = wait_and_queue(Duration::from_secs(60), &mut rx, &mut pending).await;
        assert!(exit == WaitExit::Shutdown);
    }
}
