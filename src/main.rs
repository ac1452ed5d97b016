use std::{collections::HashMap, sync::Arc};

use handlers::{handle_callback_query, handle_message, BookingSession};
use tokio::sync::Mutex;
mod booking;
mod catalog;
mod flow;
mod handlers;
mod models;
use teloxide::{
    dispatching::UpdateFilterExt,
    prelude::*,
    types::{CallbackQuery, MaybeInaccessibleMessage, Message},
};

extern crate pretty_env_logger;
#[macro_use]
extern crate log;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    pretty_env_logger::init();
    let bot = Bot::from_env();

    let user_sessions = Arc::new(Mutex::new(HashMap::<i64, BookingSession>::new()));

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let user_sessions = user_sessions.clone();

            move |bot: Bot, msg: Message| {
                let user_sessions = user_sessions.clone();

                async move {
                    let mut sessions = user_sessions.lock().await;
                    if let Err(err) = handle_message(bot, msg, &mut sessions).await {
                        error!("message handler failed: {}", err);
                    }
                    respond(())
                }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let user_sessions = user_sessions.clone();

            move |q: CallbackQuery, bot: Bot| {
                let user_sessions = user_sessions.clone();

                async move {
                    let mut sessions = user_sessions.lock().await;
                    let message = q
                        .message
                        .as_ref()
                        .and_then(MaybeInaccessibleMessage::regular_message)
                        .cloned();
                    if let Some(message) = message {
                        if let Err(err) = handle_callback_query(bot, q, message, &mut sessions).await {
                            error!("callback handler failed: {}", err);
                        }
                    }
                    respond(())
                }
            }
        }));

    info!("check-in bot starting");
    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
