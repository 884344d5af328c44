use mahjongpad::round::models::WinKind;
use mahjongpad::shared::AppError;

mod utils;

use utils::TestContext;

#[tokio::test]
async fn direct_hit_moves_base_points_between_two_seats() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    // fan 3 direct hit: base points 8
    let round = ctx
        .round_service
        .record_direct_hit(&session_id, "p1".to_string(), "p3".to_string(), 3, vec![])
        .await
        .unwrap();
    assert_eq!(round.base_points, 8);
    assert_eq!(round.win_kind, WinKind::DirectHit);
    assert_eq!(round.deltas[&1], 8);
    assert_eq!(round.deltas[&2], 0);
    assert_eq!(round.deltas[&3], -8);
    assert_eq!(round.deltas[&4], 0);

    let totals = ctx.round_service.seat_totals(&session_id).await.unwrap();
    assert_eq!(totals.totals[&1], 8);
    assert_eq!(totals.totals[&3], -8);
    assert_eq!(totals.totals.values().sum::<i32>(), 0);
}

#[tokio::test]
async fn self_draw_splits_cost_across_three_seats() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    // fan 5 self-draw: base 24, each other seat pays half (12)
    let round = ctx
        .round_service
        .record_self_draw(&session_id, "p2".to_string(), 5, vec![])
        .await
        .unwrap();
    assert_eq!(round.deltas[&2], 36);
    assert_eq!(round.deltas[&1], -12);
    assert_eq!(round.deltas[&3], -12);
    assert_eq!(round.deltas[&4], -12);
}

#[tokio::test]
async fn responsibility_self_draw_charges_one_seat_the_full_payout() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    // fan 7: base 48, payout 3 * 24 = 72 borne entirely by the responsible seat
    let round = ctx
        .round_service
        .record_self_draw_with_responsibility(
            &session_id,
            "p3".to_string(),
            "p1".to_string(),
            7,
            vec![],
        )
        .await
        .unwrap();
    assert_eq!(round.deltas[&3], 72);
    assert_eq!(round.deltas[&1], -72);
    assert_eq!(round.deltas[&2], 0);
    assert_eq!(round.deltas[&4], 0);
}

#[tokio::test]
async fn chicken_hand_is_recorded_but_moves_nothing() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    let round = ctx
        .round_service
        .record_self_draw(&session_id, "p1".to_string(), 0, vec![])
        .await
        .unwrap();
    assert!(round.deltas.values().all(|&points| points == 0));

    let history = ctx.round_service.round_history(&session_id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn running_counters_track_replay_totals() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    ctx.round_service
        .record_direct_hit(&session_id, "p1".to_string(), "p3".to_string(), 3, vec![])
        .await
        .unwrap();
    ctx.round_service
        .record_self_draw(&session_id, "p2".to_string(), 5, vec![])
        .await
        .unwrap();
    ctx.round_service
        .record_self_draw_with_responsibility(
            &session_id,
            "p4".to_string(),
            "p2".to_string(),
            6,
            vec![],
        )
        .await
        .unwrap();

    let totals = ctx.round_service.seat_totals(&session_id).await.unwrap();
    for (player_id, seat) in [("p1", 1u8), ("p2", 2), ("p3", 3), ("p4", 4)] {
        let counter = ctx.running_points(&session_id, player_id).await;
        assert_eq!(
            counter, totals.totals[&seat],
            "counter for {player_id} must equal the replay total of seat {seat}"
        );
    }
    assert_eq!(totals.totals.values().sum::<i32>(), 0);
}

#[tokio::test]
async fn reversing_a_round_restores_the_previous_scores() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    let round = ctx
        .round_service
        .record_direct_hit(&session_id, "p1".to_string(), "p3".to_string(), 4, vec![])
        .await
        .unwrap();
    ctx.round_service
        .reverse_round(&session_id, round.id)
        .await
        .unwrap();

    let totals = ctx.round_service.seat_totals(&session_id).await.unwrap();
    assert!(totals.totals.values().all(|&points| points == 0));
    assert_eq!(ctx.running_points(&session_id, "p1").await, 0);
    assert_eq!(ctx.running_points(&session_id, "p3").await, 0);

    let history = ctx.round_service.round_history(&session_id).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn reversing_twice_fails_without_double_applying() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    let keeper = ctx
        .round_service
        .record_self_draw(&session_id, "p2".to_string(), 5, vec![])
        .await
        .unwrap();
    let round = ctx
        .round_service
        .record_direct_hit(&session_id, "p1".to_string(), "p4".to_string(), 3, vec![])
        .await
        .unwrap();

    ctx.round_service
        .reverse_round(&session_id, round.id)
        .await
        .unwrap();
    let second = ctx.round_service.reverse_round(&session_id, round.id).await;
    assert!(matches!(second.unwrap_err(), AppError::NotFound(_)));

    // Only the self-draw remains; its effect was not disturbed.
    let totals = ctx.round_service.seat_totals(&session_id).await.unwrap();
    assert_eq!(totals.totals[&2], keeper.deltas[&2]);
    assert_eq!(totals.totals.values().sum::<i32>(), 0);
}

#[tokio::test]
async fn round_ids_from_another_session_are_not_found() {
    let ctx = TestContext::new();
    let session_a = ctx.active_session().await;

    let other = ctx
        .session_service
        .create_session("q1".to_string(), "Other".to_string())
        .await
        .unwrap();
    for (id, name) in [("q2", "B"), ("q3", "C"), ("q4", "D")] {
        ctx.session_service
            .join_session(&other.id, id.to_string(), name.to_string(), false)
            .await
            .unwrap();
    }
    ctx.session_service.start_session(&other.id).await.unwrap();

    let round = ctx
        .round_service
        .record_direct_hit(&session_a, "p1".to_string(), "p2".to_string(), 2, vec![])
        .await
        .unwrap();

    let result = ctx.round_service.reverse_round(&other.id, round.id).await;
    assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));

    // The round is still intact in its own session.
    let history = ctx.round_service.round_history(&session_a).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn history_preserves_creation_order() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    for fan in [1u8, 2, 3] {
        ctx.round_service
            .record_direct_hit(&session_id, "p1".to_string(), "p2".to_string(), fan, vec![])
            .await
            .unwrap();
    }

    let history = ctx.round_service.round_history(&session_id).await.unwrap();
    let fans: Vec<u8> = history.iter().map(|r| r.fan_count).collect();
    assert_eq!(fans, vec![1, 2, 3]);
    assert!(history.windows(2).all(|pair| pair[0].id < pair[1].id));
}

#[tokio::test]
async fn vacated_seat_keeps_paying_and_rejoin_inherits_the_balance() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    // p3 wins fan 3 direct hit (+8), then leaves mid-session.
    ctx.round_service
        .record_direct_hit(&session_id, "p3".to_string(), "p1".to_string(), 3, vec![])
        .await
        .unwrap();
    ctx.session_service
        .leave_session(&session_id, "p3")
        .await
        .unwrap();

    // A self-draw by p2 still charges the now-empty seat 3.
    ctx.round_service
        .record_self_draw(&session_id, "p2".to_string(), 5, vec![])
        .await
        .unwrap();

    let totals = ctx.round_service.seat_totals(&session_id).await.unwrap();
    assert_eq!(totals.totals[&3], 8 - 12);
    assert_eq!(totals.totals.values().sum::<i32>(), 0);

    // A replacement takes seat 3 and inherits the accumulated balance.
    let replacement = ctx
        .session_service
        .join_session(&session_id, "p5".to_string(), "Eve".to_string(), false)
        .await
        .unwrap();
    assert_eq!(replacement.seat, Some(3));
    assert_eq!(replacement.running_points, -4);
}

#[tokio::test]
async fn reversal_still_reaches_rounds_of_departed_players() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    let round = ctx
        .round_service
        .record_direct_hit(&session_id, "p3".to_string(), "p1".to_string(), 5, vec![])
        .await
        .unwrap();
    ctx.session_service
        .leave_session(&session_id, "p3")
        .await
        .unwrap();

    // The ledger backfill resolves p3 to seat 3 even with the seat empty.
    ctx.round_service
        .reverse_round(&session_id, round.id)
        .await
        .unwrap();

    let totals = ctx.round_service.seat_totals(&session_id).await.unwrap();
    assert!(totals.totals.values().all(|&points| points == 0));
}

#[tokio::test]
async fn finalize_freezes_replay_totals_into_the_snapshot() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    ctx.round_service
        .record_direct_hit(&session_id, "p1".to_string(), "p4".to_string(), 6, vec![])
        .await
        .unwrap();
    ctx.round_service
        .record_self_draw(&session_id, "p3".to_string(), 2, vec![])
        .await
        .unwrap();

    let totals = ctx.round_service.seat_totals(&session_id).await.unwrap();
    let finalized = ctx
        .session_service
        .finalize_session(&session_id)
        .await
        .unwrap();

    let snapshot = finalized.final_scores.unwrap();
    assert_eq!(snapshot.len(), 4);
    for (seat, entry) in &snapshot {
        assert_eq!(entry.points, totals.totals[seat]);
    }
    assert_eq!(snapshot[&1].player_id, "p1");
    assert_eq!(snapshot[&4].player_name, "Dave");
}

#[tokio::test]
async fn scores_remain_readable_after_everyone_left_a_completed_session() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    ctx.round_service
        .record_direct_hit(&session_id, "p2".to_string(), "p4".to_string(), 3, vec![])
        .await
        .unwrap();
    ctx.session_service
        .finalize_session(&session_id)
        .await
        .unwrap();
    for player_id in ["p1", "p2", "p3", "p4"] {
        ctx.session_service
            .leave_session(&session_id, player_id)
            .await
            .unwrap();
    }

    // Identities come from the frozen snapshot once occupants are gone.
    let totals = ctx.round_service.seat_totals(&session_id).await.unwrap();
    assert_eq!(totals.totals[&2], 8);
    let standing = totals.standings.iter().find(|s| s.seat == 2).unwrap();
    assert_eq!(standing.player_id.as_deref(), Some("p2"));
    assert_eq!(standing.points, 8);
}

#[tokio::test]
async fn lifetime_stats_accumulate_per_round() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    ctx.round_service
        .record_direct_hit(
            &session_id,
            "p1".to_string(),
            "p3".to_string(),
            3,
            vec!["all-pungs".to_string()],
        )
        .await
        .unwrap();
    ctx.round_service
        .record_self_draw(&session_id, "p1".to_string(), 10, vec![])
        .await
        .unwrap();

    let winner = ctx
        .stats_service
        .get_player_stats("p1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(winner.games, 2);
    assert_eq!(winner.wins, 2);
    assert_eq!(winner.direct_hit_wins, 1);
    assert_eq!(winner.self_draws, 1);
    assert_eq!(winner.limit_hands, 1);
    assert_eq!(winner.highest_fan, 10);
    assert_eq!(winner.pattern_counts["all-pungs"], 1);

    let loser = ctx
        .stats_service
        .get_player_stats("p3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loser.games, 2);
    assert_eq!(loser.deal_ins, 1);
}

#[tokio::test]
async fn reversal_does_not_roll_back_lifetime_stats() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    let round = ctx
        .round_service
        .record_direct_hit(&session_id, "p1".to_string(), "p3".to_string(), 3, vec![])
        .await
        .unwrap();
    ctx.round_service
        .reverse_round(&session_id, round.id)
        .await
        .unwrap();

    let winner = ctx
        .stats_service
        .get_player_stats("p1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(winner.wins, 1, "stats keep the original outcome");

    let loser = ctx
        .stats_service
        .get_player_stats("p3")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loser.deal_ins, 1);
}

#[tokio::test]
async fn recording_validates_participants_and_fan_range() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;

    let unknown_winner = ctx
        .round_service
        .record_self_draw(&session_id, "stranger".to_string(), 3, vec![])
        .await;
    assert!(matches!(unknown_winner.unwrap_err(), AppError::Validation(_)));

    let self_hit = ctx
        .round_service
        .record_direct_hit(&session_id, "p1".to_string(), "p1".to_string(), 3, vec![])
        .await;
    assert!(matches!(self_hit.unwrap_err(), AppError::Validation(_)));

    let fan_too_high = ctx
        .round_service
        .record_self_draw(&session_id, "p1".to_string(), 14, vec![])
        .await;
    assert!(matches!(fan_too_high.unwrap_err(), AppError::Validation(_)));
}

#[tokio::test]
async fn rounds_require_an_active_session() {
    let ctx = TestContext::new();
    let session = ctx
        .session_service
        .create_session("p1".to_string(), "Alice".to_string())
        .await
        .unwrap();

    let waiting = ctx
        .round_service
        .record_self_draw(&session.id, "p1".to_string(), 3, vec![])
        .await;
    assert!(matches!(waiting.unwrap_err(), AppError::Validation(_)));

    let missing = ctx
        .round_service
        .record_self_draw("no-such-session", "p1".to_string(), 3, vec![])
        .await;
    assert!(matches!(missing.unwrap_err(), AppError::NotFound(_)));
}

#[tokio::test]
async fn record_and_reverse_emit_change_notifications() {
    let ctx = TestContext::new();
    let session_id = ctx.active_session().await;
    let mut receiver = ctx.event_bus.subscribe_to_session(&session_id).await;

    let round = ctx
        .round_service
        .record_direct_hit(&session_id, "p1".to_string(), "p2".to_string(), 2, vec![])
        .await
        .unwrap();
    let event = receiver.recv().await.unwrap();
    assert_eq!(event.event_type(), "round_recorded");

    ctx.round_service
        .reverse_round(&session_id, round.id)
        .await
        .unwrap();
    let event = receiver.recv().await.unwrap();
    assert_eq!(event.event_type(), "round_reversed");
}
