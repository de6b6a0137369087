//! Telegram update handlers.
//!
//! Text messages are converted into the core `IncomingUpdate` model and handed
//! to the command dispatcher; everything else is ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use nfb_core::{
    domain::{ChatId, UserId},
    messaging::types::IncomingUpdate,
};

use crate::router::AppState;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(update) = incoming_update(&msg) else {
        return Ok(());
    };

    let user_id = update.user_id();
    if let Err(e) = state.dispatcher.handle(update).await {
        tracing::error!(user_id = user_id.0, error = %e, "failed to handle message");
    }
    Ok(())
}

fn incoming_update(msg: &Message) -> Option<IncomingUpdate> {
    let user = msg.from()?;
    let text = msg.text()?;
    Some(IncomingUpdate::from_text(
        ChatId(msg.chat.id.0),
        UserId(user.id.0 as i64),
        user.username.clone(),
        text,
    ))
}
