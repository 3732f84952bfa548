use std::collections::BTreeMap;

use async_trait::async_trait;
use marquee_core::error::{CoreError, CoreResult};
use marquee_core::ledger::{HoldOutcome, SeatLedger, SeatState};
use marquee_shared::{ReservationId, SeatLabel, ShowId};
use redis::AsyncCommands;

/// Redis seat ledger. Seat slots live as fields of one hash per show
/// (`show:{id}:seats`), valued `FREE`, `HELD:{reservation}` or
/// `BOOKED:{reservation}`. All mutations go through Lua scripts that check
/// every requested seat before touching any of them, so each call is one
/// atomic operation per show instance.
pub struct RedisLedger {
    client: redis::Client,
    init: redis::Script,
    hold: redis::Script,
    confirm: redis::Script,
    release: redis::Script,
}

fn redis_err(e: redis::RedisError) -> CoreError {
    CoreError::Store(e.to_string())
}

fn seats_key(show_id: ShowId) -> String {
    format!("show:{}:seats", show_id)
}

impl RedisLedger {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            init: redis::Script::new(
                r#"
                for i = 1, #ARGV do
                    redis.call('HSETNX', KEYS[1], ARGV[i], 'FREE')
                end
                return 1
                "#,
            ),
            // ARGV[1] = reservation token, ARGV[2..] = seat labels.
            // Returns the conflicting labels; empty means the hold applied.
            hold: redis::Script::new(
                r#"
                local conflicts = {}
                for i = 2, #ARGV do
                    local v = redis.call('HGET', KEYS[1], ARGV[i])
                    if v == false then
                        return redis.error_reply('unknown seat ' .. ARGV[i])
                    end
                    if v ~= 'FREE' then
                        table.insert(conflicts, ARGV[i])
                    end
                end
                if #conflicts > 0 then
                    return conflicts
                end
                for i = 2, #ARGV do
                    redis.call('HSET', KEYS[1], ARGV[i], 'HELD:' .. ARGV[1])
                end
                return conflicts
                "#,
            ),
            confirm: redis::Script::new(
                r#"
                for i = 2, #ARGV do
                    local v = redis.call('HGET', KEYS[1], ARGV[i])
                    if v ~= 'HELD:' .. ARGV[1] and v ~= 'BOOKED:' .. ARGV[1] then
                        return 0
                    end
                end
                for i = 2, #ARGV do
                    redis.call('HSET', KEYS[1], ARGV[i], 'BOOKED:' .. ARGV[1])
                end
                return 1
                "#,
            ),
            release: redis::Script::new(
                r#"
                local released = 0
                for i = 2, #ARGV do
                    if redis.call('HGET', KEYS[1], ARGV[i]) == 'HELD:' .. ARGV[1] then
                        redis.call('HSET', KEYS[1], ARGV[i], 'FREE')
                        released = released + 1
                    end
                end
                return released
                "#,
            ),
        })
    }

    async fn connection(&self) -> CoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_err)
    }
}

fn label_args(seats: &[SeatLabel]) -> Vec<String> {
    seats.iter().map(|l| l.as_str().to_string()).collect()
}

#[async_trait]
impl SeatLedger for RedisLedger {
    async fn init_seats(&self, show_id: ShowId, labels: &[SeatLabel]) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = self
            .init
            .key(seats_key(show_id))
            .arg(label_args(labels))
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn try_hold(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        reservation_id: ReservationId,
    ) -> CoreResult<HoldOutcome> {
        let mut conn = self.connection().await?;
        let conflicts: Vec<String> = self
            .hold
            .key(seats_key(show_id))
            .arg(reservation_id.to_string())
            .arg(label_args(seats))
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;

        if conflicts.is_empty() {
            Ok(HoldOutcome::Held)
        } else {
            Ok(HoldOutcome::Conflict(
                conflicts.into_iter().map(SeatLabel::new).collect(),
            ))
        }
    }

    async fn confirm(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        reservation_id: ReservationId,
    ) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        let booked: i64 = self
            .confirm
            .key(seats_key(show_id))
            .arg(reservation_id.to_string())
            .arg(label_args(seats))
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;

        if booked == 1 {
            Ok(())
        } else {
            Err(CoreError::Stale)
        }
    }

    async fn release(
        &self,
        show_id: ShowId,
        seats: &[SeatLabel],
        reservation_id: ReservationId,
    ) -> CoreResult<()> {
        let mut conn = self.connection().await?;
        let _: i64 = self
            .release
            .key(seats_key(show_id))
            .arg(reservation_id.to_string())
            .arg(label_args(seats))
            .invoke_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn snapshot(&self, show_id: ShowId) -> CoreResult<BTreeMap<SeatLabel, SeatState>> {
        let mut conn = self.connection().await?;
        let slots: std::collections::HashMap<String, String> = conn
            .hgetall(seats_key(show_id))
            .await
            .map_err(redis_err)?;

        if slots.is_empty() {
            return Err(CoreError::NotFound(format!("seat ledger for show {show_id}")));
        }

        slots
            .into_iter()
            .map(|(label, value)| {
                let state = if value == "FREE" {
                    SeatState::Free
                } else if value.starts_with("HELD:") {
                    SeatState::Held
                } else if value.starts_with("BOOKED:") {
                    SeatState::Booked
                } else {
                    return Err(CoreError::Store(format!("unknown seat slot value {value}")));
                };
                Ok((SeatLabel::new(label), state))
            })
            .collect()
    }
}
