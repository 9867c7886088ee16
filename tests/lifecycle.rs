//! Session lifecycle: clean teardown, server-ping answering, reconnection,
//! and emergency teardown when the server drops the connection.

mod common;

use std::time::Duration;

use common::{answer_ping, fast_config, ScriptedServer, CLOSE};
use tern_irc::{Message, Session};

#[tokio::test]
async fn disconnect_sends_quit_and_stops_tasks() {
    let server = ScriptedServer::start(1, answer_ping).await;
    let session = Session::new(fast_config(&server.addr()));

    session.connect().await.unwrap();
    session.disconnect("bye now").await.unwrap();
    assert!(!session.is_connected());

    let received = server.finish().await;
    let quit = received.iter().find(|m| m.command == "QUIT").unwrap();
    assert_eq!(quit.params, ["bye now"]);
}

#[tokio::test]
async fn server_pings_are_answered() {
    let server = ScriptedServer::start(1, |msg| {
        if msg.command == "PRIVMSG" {
            vec!["PING :probe-1".to_owned()]
        } else {
            answer_ping(msg)
        }
    })
    .await;
    let session = Session::new(fast_config(&server.addr()));

    session.connect().await.unwrap();
    session.privmsg("#alpha", "poke").await.unwrap();
    session.disconnect("done").await.unwrap();

    let received = server.finish().await;
    let pong = received.iter().find(|m| m.command == "PONG").unwrap();
    assert_eq!(pong.params, ["probe-1"]);
}

#[tokio::test]
async fn reconnect_runs_a_fresh_registration() {
    let server = ScriptedServer::start(2, answer_ping).await;
    let session = Session::new(fast_config(&server.addr()));

    session.connect().await.unwrap();
    session.reconnect("testing reconnect").await.unwrap();
    assert!(session.is_connected());
    session.disconnect("done").await.unwrap();

    let received = server.finish().await;
    let nicks = received.iter().filter(|m| m.command == "NICK").count();
    let quits = received.iter().filter(|m| m.command == "QUIT").count();
    assert_eq!(nicks, 2);
    assert_eq!(quits, 2);
}

#[tokio::test]
async fn queued_commands_do_not_leak_across_sessions() {
    let server = ScriptedServer::start(1, answer_ping).await;
    let session = Session::new(fast_config(&server.addr()));

    // Enqueued while disconnected; a later connect must not send it.
    session
        .send(Message::privmsg("#alpha", "from a past life"))
        .await
        .unwrap();

    session.connect().await.unwrap();
    session.disconnect("done").await.unwrap();

    let received = server.finish().await;
    assert!(received.iter().all(|m| m.command != "PRIVMSG"));
}

#[tokio::test]
async fn server_close_triggers_emergency_teardown() {
    let server = ScriptedServer::start(1, |msg| {
        if msg.command == "PRIVMSG" {
            vec![CLOSE.to_owned()]
        } else {
            answer_ping(msg)
        }
    })
    .await;
    let session = Session::new(fast_config(&server.addr()));

    session.connect().await.unwrap();
    session.send(Message::privmsg("#alpha", "last words")).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!session.is_connected());

    // Teardown already happened; disconnect is a clean no-op.
    session.disconnect("done").await.unwrap();
    let _ = server.finish().await;
}
