//! Channel and messaging operations: join confirmation counting, refusal
//! numerics, delivery-error detection, and whois collection.

mod common;

use common::{answer_ping, fast_config, ScriptedServer};
use tern_irc::{Session, SessionError};

async fn connected_session(server: &ScriptedServer) -> Session {
    let session = Session::new(fast_config(&server.addr()));
    session.connect().await.unwrap();
    session
}

#[tokio::test]
async fn join_waits_for_every_channel() {
    let server = ScriptedServer::start(1, |msg| {
        if msg.command == "JOIN" {
            msg.params[0]
                .split(',')
                .map(|chan| format!(":tern!tern@localhost JOIN {chan}"))
                .collect()
        } else {
            answer_ping(msg)
        }
    })
    .await;

    let session = connected_session(&server).await;
    session.join("#alpha,#beta", None).await.unwrap();
    session.disconnect("done").await.unwrap();

    let received = server.finish().await;
    let join = received.iter().find(|m| m.command == "JOIN").unwrap();
    assert_eq!(join.params, ["#alpha,#beta"]);
}

#[tokio::test]
async fn join_confirmations_arrive_in_any_order() {
    let server = ScriptedServer::start(1, |msg| {
        if msg.command == "JOIN" {
            // Confirm the requested channels back to front.
            msg.params[0]
                .split(',')
                .rev()
                .map(|chan| format!(":tern!tern@localhost JOIN {chan}"))
                .collect()
        } else {
            answer_ping(msg)
        }
    })
    .await;

    let session = connected_session(&server).await;
    session.join("#alpha,#beta", None).await.unwrap();
    session.disconnect("done").await.unwrap();
}

#[tokio::test]
async fn join_times_out_on_missing_confirmation() {
    let server = ScriptedServer::start(1, |msg| {
        if msg.command == "JOIN" {
            // Confirm only the first channel; the second never arrives.
            let first = msg.params[0].split(',').next().unwrap();
            vec![format!(":tern!tern@localhost JOIN {first}")]
        } else {
            answer_ping(msg)
        }
    })
    .await;

    let session = connected_session(&server).await;
    let err = session.join("#alpha,#beta", None).await.unwrap_err();
    assert!(matches!(err, SessionError::Timeout));
    session.disconnect("done").await.unwrap();
}

#[tokio::test]
async fn join_surfaces_refusal_numeric() {
    let server = ScriptedServer::start(1, |msg| {
        if msg.command == "JOIN" {
            vec![":scripted.test 473 tern #vip :Cannot join channel (+i)".to_owned()]
        } else {
            answer_ping(msg)
        }
    })
    .await;

    let session = connected_session(&server).await;
    let err = session.join("#vip", None).await.unwrap_err();
    match err {
        SessionError::Protocol(name) => assert_eq!(name, "ERR_INVITEONLYCHAN"),
        other => panic!("expected Protocol, got {other:?}"),
    }
    session.disconnect("done").await.unwrap();
}

#[tokio::test]
async fn privmsg_quiet_is_delivered_error_is_not() {
    let server = ScriptedServer::start(1, |msg| {
        if msg.command == "PRIVMSG" && msg.params[0] == "ghost" {
            vec![":scripted.test 401 tern ghost :No such nick".to_owned()]
        } else {
            answer_ping(msg)
        }
    })
    .await;

    let session = connected_session(&server).await;

    session.privmsg("#alpha", "hello").await.unwrap();

    let err = session.privmsg("ghost", "anyone?").await.unwrap_err();
    match err {
        SessionError::Protocol(name) => assert_eq!(name, "ERR_NOSUCHNICK"),
        other => panic!("expected Protocol, got {other:?}"),
    }

    session.disconnect("done").await.unwrap();
}

#[tokio::test]
async fn whois_collects_until_end_marker() {
    let server = ScriptedServer::start(1, |msg| {
        if msg.command == "WHOIS" {
            vec![
                ":scripted.test 311 tern alice alice localhost * :Alice".to_owned(),
                ":scripted.test 312 tern alice scripted.test :Test net".to_owned(),
                ":scripted.test 319 tern alice :#alpha #beta".to_owned(),
                ":scripted.test 318 tern alice :End of WHOIS list".to_owned(),
            ]
        } else {
            answer_ping(msg)
        }
    })
    .await;

    let session = connected_session(&server).await;
    let report = session.whois("alice").await.unwrap();
    session.disconnect("done").await.unwrap();

    assert_eq!(
        report["RPL_WHOISUSER"],
        vec!["alice alice localhost * Alice"]
    );
    assert_eq!(report["RPL_WHOISCHANNELS"], vec!["alice #alpha #beta"]);
    assert!(!report.contains_key("RPL_ENDOFWHOIS"));
}

#[tokio::test]
async fn whois_unknown_nick_is_refused() {
    let server = ScriptedServer::start(1, |msg| {
        if msg.command == "WHOIS" {
            vec![":scripted.test 401 tern nobody :No such nick".to_owned()]
        } else {
            answer_ping(msg)
        }
    })
    .await;

    let session = connected_session(&server).await;
    let err = session.whois("nobody").await.unwrap_err();
    assert!(matches!(err, SessionError::Protocol(_)));
    session.disconnect("done").await.unwrap();
}
