//! Agora 실시간 세션 데모 클라이언트
//!
//! 표준 입력으로 명령을 받아 세션 루프에 넘기고 서버 이벤트를 출력한다.

use agora_realtime::client::{
    run_client_session, ClientCommand, ClientSessionConfig, RoomStateAdapter,
};
use agora_realtime::config::Config;
use agora_realtime::protocol::{
    DebateVote, ModeratorActionKind, RoomKind, ServerMessage, StrawVote,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let user_id = std::env::var("USER_ID").unwrap_or_else(|_| "guest".to_string());
    let url = std::env::var("SERVER_URL")
        .unwrap_or_else(|_| format!("ws://127.0.0.1:{}/ws", config.port));

    let session_config = ClientSessionConfig {
        url,
        user_id: user_id.clone(),
        reconnect: config.reconnect.clone(),
    };

    let (adapter, snapshots) = RoomStateAdapter::new(user_id.clone());
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let session_task = tokio::spawn(run_client_session(
        session_config,
        adapter,
        command_rx,
        event_tx,
    ));

    // 서버 이벤트 출력 태스크
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(&event);
        }
    });

    println!("You are '{}'. Commands:", user_id);
    println!("  /join <room> [debate|stream] [mod]   /leave");
    println!("  /poll <for|against|neutral>          /vote <l> <p> <o> <y|n>");
    println!("  /mod <action> [target]               plain text = chat");

    let mut current_room: Option<String> = None;
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        // 어댑터 스냅샷 기준으로 현재 방 추적
        if let Some(room_id) = snapshots.borrow().room_id.clone() {
            current_room = Some(room_id);
        }

        match parse_command(&line, current_room.as_deref()) {
            Ok(Some(cmd)) => {
                if let ClientCommand::Join { room_id, .. } = &cmd {
                    current_room = Some(room_id.clone());
                }
                if command_tx.send(cmd).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(msg) => println!("! {}", msg),
        }
    }

    let _ = command_tx.send(ClientCommand::Shutdown);
    let _ = session_task.await;
    printer.abort();
    Ok(())
}

/// 입력 한 줄을 세션 명령으로 해석 (Ok(None)은 종료)
fn parse_command(line: &str, current_room: Option<&str>) -> Result<Option<ClientCommand>, String> {
    if !line.starts_with('/') {
        let room_id = current_room.ok_or("join a room first")?.to_string();
        return Ok(Some(ClientCommand::Chat {
            room_id,
            content: line.to_string(),
        }));
    }

    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    match command {
        "/quit" => Ok(None),
        "/join" => {
            let room_id = parts.next().ok_or("usage: /join <room> [debate|stream] [mod]")?;
            let kind = match parts.next() {
                Some("debate") => Some(RoomKind::Debate),
                Some("stream") => Some(RoomKind::Stream),
                Some(other) if other != "mod" => return Err(format!("unknown kind '{}'", other)),
                _ => None,
            };
            let as_moderator = line.split_whitespace().any(|p| p == "mod");
            Ok(Some(ClientCommand::Join {
                room_id: room_id.to_string(),
                kind,
                as_moderator,
            }))
        }
        "/leave" => Ok(Some(ClientCommand::Leave)),
        "/poll" => {
            let room_id = current_room.ok_or("join a room first")?.to_string();
            let vote = match parts.next() {
                Some("for") => StrawVote::For,
                Some("against") => StrawVote::Against,
                Some("neutral") => StrawVote::Neutral,
                _ => return Err("usage: /poll <for|against|neutral>".to_string()),
            };
            Ok(Some(ClientCommand::StrawPoll { room_id, vote }))
        }
        "/vote" => {
            let room_id = current_room.ok_or("join a room first")?.to_string();
            let mut score = |name: &str| -> Result<u8, String> {
                parts
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| format!("usage: /vote <l> <p> <o> <y|n> (missing {})", name))
            };
            let logical_reasoning = score("logical reasoning")?;
            let politeness = score("politeness")?;
            let openness = score("openness")?;
            let wants_to_continue = matches!(parts.next(), Some("y") | Some("yes"));
            Ok(Some(ClientCommand::Vote {
                room_id,
                vote: DebateVote {
                    logical_reasoning,
                    politeness,
                    openness,
                    wants_to_continue,
                },
            }))
        }
        "/mod" => {
            let room_id = current_room.ok_or("join a room first")?.to_string();
            let action = match parts.next() {
                Some("mute") => ModeratorActionKind::Mute,
                Some("unmute") => ModeratorActionKind::Unmute,
                Some("kick") => ModeratorActionKind::Kick,
                Some("pause") => ModeratorActionKind::PauseStream,
                Some("resume") => ModeratorActionKind::ResumeStream,
                Some("end") => ModeratorActionKind::EndStream,
                _ => return Err("usage: /mod <mute|unmute|kick|pause|resume|end> [target]".to_string()),
            };
            let target = parts.next().map(|s| s.to_string());
            Ok(Some(ClientCommand::Moderate {
                room_id,
                action,
                target,
            }))
        }
        other => Err(format!("unknown command '{}'", other)),
    }
}

fn print_event(event: &ServerMessage) {
    match event {
        ServerMessage::Connected { user_id, .. } => {
            println!("* connected as {}", user_id);
        }
        ServerMessage::RoomJoined {
            room_id,
            participant_count,
            ..
        } => {
            println!("* joined {} ({} participants)", room_id, participant_count);
        }
        ServerMessage::UserJoined {
            user_id,
            participant_count,
        } => {
            println!("* {} joined ({} participants)", user_id, participant_count);
        }
        ServerMessage::UserLeft {
            user_id,
            participant_count,
        } => {
            println!("* {} left ({} participants)", user_id, participant_count);
        }
        ServerMessage::ChatMessage {
            user_id,
            content,
            turn,
            ..
        } => match turn {
            Some(turn) => println!("[{} #{}] {}", user_id, turn, content),
            None => println!("[{}] {}", user_id, content),
        },
        ServerMessage::LiveVote { user_id, vote, .. } => {
            println!("* {} polled {:?}", user_id, vote);
        }
        ServerMessage::VotingStarted { .. } => {
            println!("* turn limits reached, submit your ratings with /vote");
        }
        ServerMessage::VoteRecorded { .. } => {
            println!("* vote recorded, waiting for your peer");
        }
        ServerMessage::DebateResult {
            continued, votes, ..
        } => {
            for vote in votes {
                println!(
                    "* {} rated: logic {}, politeness {}, openness {}, continue: {}",
                    vote.user_id,
                    vote.vote.logical_reasoning,
                    vote.vote.politeness,
                    vote.vote.openness,
                    vote.vote.wants_to_continue
                );
            }
            if *continued {
                println!("* both agreed to continue, debate is now freeform");
            } else {
                println!("* debate concluded");
            }
        }
        ServerMessage::ModeratorAction { action, target, .. } => {
            println!("* moderator: {:?} {:?}", action, target);
        }
        ServerMessage::StreamUpdate {
            status,
            viewer_count,
            ..
        } => {
            println!("* stream is {} ({} viewers)", status.as_str(), viewer_count);
        }
        ServerMessage::Kicked { room_id } => {
            println!("* you were removed from {}", room_id);
        }
        ServerMessage::Error { code, message } => {
            println!("! {}: {}", code, message);
        }
        ServerMessage::RoomMembers { users } => {
            println!("* members: {}", users.join(", "));
        }
        ServerMessage::HeartbeatAck => {}
    }
}
