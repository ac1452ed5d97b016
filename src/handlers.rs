use std::collections::HashMap;
use std::error::Error;

use chrono::{Datelike, Days, Local, NaiveDate, Utc};
use teloxide::{
    prelude::*,
    types::{
        CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, Message, MessageId,
        ParseMode, ReplyMarkup,
    },
};

use crate::booking::{booking_reference, format_brl, BookingState, BookingUpdate};
use crate::catalog;
use crate::flow::{
    self, check_entry, FieldError, Gate, PaymentOutcome, Step, MAX_CHILD_AGE,
};
use crate::models::{Child, GuestInfo, PaymentInfo};

/// Which of the two stay dates the calendar is currently picking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateField {
    CheckIn,
    CheckOut,
}

/// The text input the current screen is waiting for, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prompt {
    FirstName,
    LastName,
    Email,
    Phone,
    CardNumber,
    CardHolder,
    Expiry,
    Cvv,
}

/// Uncommitted guest-screen input. Committed into the record in one update
/// when the whole form validates, the way the screen's submit works.
#[derive(Debug, Clone, Default)]
struct GuestDraft {
    adults: u32,
    children: Vec<Child>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct PaymentDraft {
    card_number: Option<String>,
    card_holder: Option<String>,
    expiry_date: Option<String>,
}

/// One chat's place in the wizard: current step, the booking record, the
/// prompt being awaited and the per-screen drafts.
pub struct BookingSession {
    step: Step,
    state: BookingState,
    awaiting: Option<Prompt>,
    picking: DateField,
    cal_month: u32,
    cal_year: i32,
    guest_draft: GuestDraft,
    payment_draft: PaymentDraft,
}

impl BookingSession {
    pub fn new() -> Self {
        let today = Local::now().date_naive();
        BookingSession {
            step: Step::DateSelection,
            state: BookingState::new(),
            awaiting: None,
            picking: DateField::CheckIn,
            cal_month: today.month(),
            cal_year: today.year(),
            guest_draft: GuestDraft::default(),
            payment_draft: PaymentDraft::default(),
        }
    }
}

pub async fn handle_message(
    bot: Bot,
    msg: Message,
    sessions: &mut HashMap<i64, BookingSession>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;
    let session = sessions.entry(chat_id.0).or_insert_with(BookingSession::new);

    let text = match msg.text() {
        Some(text) => text.trim(),
        None => return Ok(()),
    };

    if text == "/start" {
        info!("chat {}: starting a new session", chat_id);
        *session = BookingSession::new();
        bot.send_message(chat_id, "🏨 Hotel Paradise\nBem-vindo ao check-in online!")
            .await?;
        return enter_step(&bot, chat_id, session, Step::DateSelection).await;
    }

    match session.awaiting {
        Some(prompt) => handle_prompt_input(&bot, chat_id, session, prompt, text).await,
        None => {
            bot.send_message(
                chat_id,
                "Use os botões para navegar ou envie /start para recomeçar.",
            )
            .await?;
            Ok(())
        }
    }
}

pub async fn handle_callback_query(
    bot: Bot,
    q: CallbackQuery,
    msg: Message,
    sessions: &mut HashMap<i64, BookingSession>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let chat_id = msg.chat.id;
    let session = sessions.entry(chat_id.0).or_insert_with(BookingSession::new);

    let data = match q.data {
        Some(ref data) => data.clone(),
        None => return Ok(()),
    };
    debug!(
        "chat {}: callback {} (step {:?}, revision {})",
        chat_id,
        data,
        session.step,
        session.state.revision()
    );

    match data.as_str() {
        "ignore" => {}

        "back" => {
            if let Some(prev) = session.step.back() {
                enter_step(&bot, chat_id, session, prev).await?;
            }
        }

        "restart" => {
            session.state.reset();
            session.guest_draft = GuestDraft::default();
            session.payment_draft = PaymentDraft::default();
            session.awaiting = None;
            enter_step(&bot, chat_id, session, Step::DateSelection).await?;
        }

        "dates:continue" => {
            let record = session.state.record();
            match flow::validate_dates(record.check_in, record.check_out) {
                Ok(()) => enter_step(&bot, chat_id, session, Step::RoomSelection).await?,
                Err(err) => {
                    bot.send_message(chat_id, format!("⚠️ {}", err)).await?;
                    show_date_selection(&bot, chat_id, session, None).await?;
                }
            }
        }

        "dates:change" => {
            session.step = Step::DateSelection;
            session.awaiting = None;
            show_date_selection(&bot, chat_id, session, Some(msg.id)).await?;
        }

        "guests:continue" => {
            if session.step != Step::GuestInformation {
                return Ok(());
            }
            let capacity = room_capacity(session);
            let draft = &session.guest_draft;
            match flow::validate_guest_count(draft.adults, draft.children.len(), capacity) {
                Ok(()) => {
                    bot.send_message(
                        chat_id,
                        "👤 Dados do Responsável\nPreencha os dados dos hóspedes",
                    )
                    .reply_markup(ReplyMarkup::InlineKeyboard(back_keyboard()))
                    .await?;
                    ask(&bot, chat_id, session, Prompt::FirstName).await?;
                }
                Err(err) => {
                    bot.send_message(chat_id, format!("⚠️ {}", err)).await?;
                    show_guest_count(&bot, chat_id, session, Some(msg.id)).await?;
                }
            }
        }

        "summary:pay" => {
            if session.step == Step::BookingSummary {
                enter_step(&bot, chat_id, session, Step::Payment).await?;
            }
        }

        _ if data.starts_with("calendar:set:") => {
            if session.step != Step::DateSelection {
                return Ok(());
            }
            let raw = &data["calendar:set:".len()..];
            match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) => handle_date_pick(&bot, chat_id, session, date, msg.id).await?,
                Err(err) => warn!("chat {}: bad calendar callback {}: {}", chat_id, data, err),
            }
        }

        _ if data.starts_with("calendar:prev:") || data.starts_with("calendar:next:") => {
            if session.step != Step::DateSelection {
                return Ok(());
            }
            let parts: Vec<&str> = data.split(':').collect();
            if let [_, direction, month, year] = parts.as_slice() {
                if let (Ok(month), Ok(year)) = (month.parse::<u32>(), year.parse::<i32>()) {
                    let (month, year) = if *direction == "prev" {
                        if month == 1 {
                            (12, year - 1)
                        } else {
                            (month - 1, year)
                        }
                    } else if month == 12 {
                        (1, year + 1)
                    } else {
                        (month + 1, year)
                    };
                    session.cal_month = month;
                    session.cal_year = year;
                    show_calendar(&bot, chat_id, session, Some(msg.id)).await?;
                }
            }
        }

        _ if data.starts_with("room:") => {
            if session.step != Step::RoomSelection {
                return Ok(());
            }
            let id = &data["room:".len()..];
            match catalog::room_by_id(id) {
                Some(room) => {
                    session.state.update(BookingUpdate {
                        selected_room: Some(room.clone()),
                        ..Default::default()
                    });
                    bot.send_message(chat_id, format!("✅ {} selecionado", room.name))
                        .await?;
                    enter_step(&bot, chat_id, session, Step::GuestInformation).await?;
                }
                None => warn!("chat {}: unknown room id {}", chat_id, id),
            }
        }

        "guests:adults:inc" => {
            if session.step == Step::GuestInformation && guests_left(session) > 0 {
                session.guest_draft.adults += 1;
                show_guest_count(&bot, chat_id, session, Some(msg.id)).await?;
            }
        }

        "guests:adults:dec" => {
            if session.step == Step::GuestInformation && session.guest_draft.adults > 1 {
                session.guest_draft.adults -= 1;
                show_guest_count(&bot, chat_id, session, Some(msg.id)).await?;
            }
        }

        "child:add" => {
            if session.step == Step::GuestInformation && guests_left(session) > 0 {
                session.guest_draft.children.push(Child { age: 0 });
                let index = session.guest_draft.children.len() - 1;
                show_age_grid(&bot, chat_id, index, msg.id).await?;
            }
        }

        _ if data.starts_with("child:del:") => {
            if session.step != Step::GuestInformation {
                return Ok(());
            }
            if let Ok(index) = data["child:del:".len()..].parse::<usize>() {
                if index < session.guest_draft.children.len() {
                    session.guest_draft.children.remove(index);
                    show_guest_count(&bot, chat_id, session, Some(msg.id)).await?;
                }
            }
        }

        _ if data.starts_with("child:age:") => {
            if session.step != Step::GuestInformation {
                return Ok(());
            }
            if let Ok(index) = data["child:age:".len()..].parse::<usize>() {
                if index < session.guest_draft.children.len() {
                    show_age_grid(&bot, chat_id, index, msg.id).await?;
                }
            }
        }

        _ if data.starts_with("child:set:") => {
            if session.step != Step::GuestInformation {
                return Ok(());
            }
            let parts: Vec<&str> = data.split(':').collect();
            if let [_, _, index, age] = parts.as_slice() {
                if let (Ok(index), Ok(age)) = (index.parse::<usize>(), age.parse::<i64>()) {
                    match flow::validate_child_age(age) {
                        Ok(age) if index < session.guest_draft.children.len() => {
                            session.guest_draft.children[index] = Child { age };
                            show_guest_count(&bot, chat_id, session, Some(msg.id)).await?;
                        }
                        Ok(_) => {}
                        Err(err) => {
                            bot.send_message(chat_id, format!("⚠️ {}", err)).await?;
                        }
                    }
                }
            }
        }

        _ => warn!("chat {}: unhandled callback {}", chat_id, data),
    }

    Ok(())
}

/// Runs the entry guard and renders the target screen. Every navigation goes
/// through here, so a stale button can never skip a prerequisite: any unmet
/// one lands the visitor back on the date screen.
async fn enter_step(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut BookingSession,
    step: Step,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let step = match check_entry(step, session.state.record()) {
        Gate::Allowed => step,
        Gate::Redirect(target) => {
            debug!(
                "chat {}: entry to {:?} blocked, redirecting to {:?}",
                chat_id, step, target
            );
            target
        }
    };
    session.step = step;
    session.awaiting = None;

    match step {
        Step::DateSelection => show_date_selection(bot, chat_id, session, None).await,
        Step::RoomSelection => show_rooms(bot, chat_id, session).await,
        Step::GuestInformation => {
            let record = session.state.record();
            session.guest_draft = GuestDraft {
                adults: record.adults,
                children: record.children.clone(),
                first_name: None,
                last_name: None,
                email: None,
            };
            show_guest_count(bot, chat_id, session, None).await
        }
        Step::BookingSummary => show_summary(bot, chat_id, session).await,
        Step::Payment => show_payment(bot, chat_id, session).await,
        Step::Confirmation => show_confirmation(bot, chat_id, session).await,
    }
}

// --- date selection -------------------------------------------------------

async fn show_date_selection(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut BookingSession,
    edit: Option<MessageId>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    session.picking = DateField::CheckIn;
    let today = Local::now().date_naive();
    let cursor = session
        .state
        .record()
        .check_in
        .map(|dt| dt.date())
        .unwrap_or(today);
    session.cal_month = cursor.month();
    session.cal_year = cursor.year();
    show_calendar(bot, chat_id, session, edit).await
}

async fn show_calendar(
    bot: &Bot,
    chat_id: ChatId,
    session: &BookingSession,
    edit: Option<MessageId>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let record = session.state.record();
    let today = Local::now().date_naive();
    let (text, min_day) = match session.picking {
        DateField::CheckIn => (
            "📅 Selecione as Datas\n\nEscolha a data de Check-in:".to_string(),
            today,
        ),
        DateField::CheckOut => {
            let check_in = record.check_in.map(|dt| dt.date()).unwrap_or(today);
            (
                format!(
                    "📅 Selecione as Datas\n\nCheck-in: {}\nEscolha a data de Check-out:",
                    format_date_pt(check_in)
                ),
                check_in + Days::new(1),
            )
        }
    };
    let markup = build_calendar(session.cal_month, session.cal_year, min_day);
    match edit {
        Some(message_id) => {
            bot.edit_message_text(chat_id, message_id, text)
                .reply_markup(markup)
                .await?;
        }
        None => {
            bot.send_message(chat_id, text)
                .reply_markup(ReplyMarkup::InlineKeyboard(markup))
                .await?;
        }
    }
    Ok(())
}

async fn handle_date_pick(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut BookingSession,
    date: NaiveDate,
    message_id: MessageId,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let midnight = date.and_hms_opt(0, 0, 0).expect("midnight exists on every day");
    match session.picking {
        DateField::CheckIn => {
            session.state.update(BookingUpdate {
                check_in: Some(midnight),
                ..Default::default()
            });
            session.picking = DateField::CheckOut;
            session.cal_month = date.month();
            session.cal_year = date.year();
            show_calendar(bot, chat_id, session, Some(message_id)).await
        }
        DateField::CheckOut => {
            session.state.update(BookingUpdate {
                check_out: Some(midnight),
                ..Default::default()
            });
            let record = session.state.record();
            let text = format!(
                "📅 Datas selecionadas\n\nCheck-in: {} (a partir das 14:00)\nCheck-out: {} (até às 12:00)\n\n🌙 {} noite(s) selecionada(s)",
                record.check_in.map(|dt| format_date_pt(dt.date())).unwrap_or_default(),
                format_date_pt(date),
                session.state.nights()
            );
            let keyboard = InlineKeyboardMarkup::new(vec![
                vec![InlineKeyboardButton::callback(
                    "Continuar para Quartos ➡️".to_string(),
                    "dates:continue".to_string(),
                )],
                vec![InlineKeyboardButton::callback(
                    "✏️ Alterar datas".to_string(),
                    "dates:change".to_string(),
                )],
            ]);
            bot.edit_message_text(chat_id, message_id, text)
                .reply_markup(keyboard)
                .await?;
            Ok(())
        }
    }
}

/// Inline calendar for one month. Days before `min_day` are rendered with a
/// cross and answer to nothing.
fn build_calendar(month: u32, year: i32, min_day: NaiveDate) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    keyboard.push(vec![InlineKeyboardButton::callback(
        format!("📅 {} {}", month_name(month), year),
        "ignore".to_string(),
    )]);

    let weekdays = ["Seg", "Ter", "Qua", "Qui", "Sex", "Sáb", "Dom"];
    keyboard.push(
        weekdays
            .iter()
            .map(|day| InlineKeyboardButton::callback(day.to_string(), "ignore".to_string()))
            .collect(),
    );

    if let Some(first_day) = NaiveDate::from_ymd_opt(year, month, 1) {
        let mut row: Vec<InlineKeyboardButton> = Vec::new();

        let shift = first_day.weekday().num_days_from_monday() as usize;
        for _ in 0..shift {
            row.push(InlineKeyboardButton::callback(" ".to_string(), "ignore".to_string()));
        }

        for day in 1..=days_in_month(month, year) {
            let date = match NaiveDate::from_ymd_opt(year, month, day) {
                Some(date) => date,
                None => continue,
            };
            if date < min_day {
                row.push(InlineKeyboardButton::callback(
                    format!("❌ {:2}", day),
                    "ignore".to_string(),
                ));
            } else {
                row.push(InlineKeyboardButton::callback(
                    format!("{:2}", day),
                    format!("calendar:set:{}", date),
                ));
            }

            if row.len() == 7 {
                keyboard.push(row.clone());
                row.clear();
            }
        }

        if !row.is_empty() {
            while row.len() < 7 {
                row.push(InlineKeyboardButton::callback(" ".to_string(), "ignore".to_string()));
            }
            keyboard.push(row);
        }
    }

    keyboard.push(vec![
        InlineKeyboardButton::callback("< Mês".to_string(), format!("calendar:prev:{}:{}", month, year)),
        InlineKeyboardButton::callback("Mês >".to_string(), format!("calendar:next:{}:{}", month, year)),
    ]);

    InlineKeyboardMarkup::new(keyboard)
}

// --- room selection -------------------------------------------------------

async fn show_rooms(
    bot: &Bot,
    chat_id: ChatId,
    session: &BookingSession,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    bot.send_message(
        chat_id,
        format!(
            "🛏 Escolha seu Quarto\n{} noite(s) — toque em Selecionar para continuar",
            session.state.nights()
        ),
    )
    .reply_markup(ReplyMarkup::InlineKeyboard(back_keyboard()))
    .await?;

    for room in catalog::rooms() {
        let caption = format!(
            "*{}*\n{}\n\n👥 Até {} pessoa(s)\n💰 {} por noite\n\n{}",
            room.name,
            room.description,
            room.capacity,
            format_brl(room.price),
            room.amenities.join(" · ")
        );
        let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
            "Selecionar ✔️".to_string(),
            format!("room:{}", room.id),
        )]]);
        bot.send_photo(chat_id, InputFile::url(room.image.clone()))
            .caption(caption)
            .parse_mode(ParseMode::Markdown)
            .reply_markup(ReplyMarkup::InlineKeyboard(keyboard))
            .await?;
    }
    Ok(())
}

// --- guest information ----------------------------------------------------

fn room_capacity(session: &BookingSession) -> u32 {
    session
        .state
        .record()
        .selected_room
        .as_ref()
        .map(|room| room.capacity)
        .unwrap_or(0)
}

fn guests_left(session: &BookingSession) -> u32 {
    let draft = &session.guest_draft;
    room_capacity(session).saturating_sub(draft.adults + draft.children.len() as u32)
}

fn guest_count_text(draft: &GuestDraft, capacity: u32) -> String {
    format!(
        "👥 Número de Hóspedes\nCapacidade máxima: {} pessoa(s)\n\nAdultos: {}\nCrianças: {}",
        capacity,
        draft.adults,
        draft.children.len()
    )
}

fn guest_count_keyboard(draft: &GuestDraft, capacity: u32) -> InlineKeyboardMarkup {
    let total = draft.adults + draft.children.len() as u32;
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    let mut adults_row = vec![InlineKeyboardButton::callback(
        format!("Adultos: {}", draft.adults),
        "ignore".to_string(),
    )];
    if draft.adults > 1 {
        adults_row.push(InlineKeyboardButton::callback("➖".to_string(), "guests:adults:dec".to_string()));
    }
    if total < capacity {
        adults_row.push(InlineKeyboardButton::callback("➕".to_string(), "guests:adults:inc".to_string()));
    }
    keyboard.push(adults_row);

    let mut children_row = vec![InlineKeyboardButton::callback(
        format!("Crianças: {}", draft.children.len()),
        "ignore".to_string(),
    )];
    if total < capacity {
        children_row.push(InlineKeyboardButton::callback("➕".to_string(), "child:add".to_string()));
    }
    keyboard.push(children_row);

    for (index, child) in draft.children.iter().enumerate() {
        keyboard.push(vec![
            InlineKeyboardButton::callback(
                format!("Criança {}: {} anos", index + 1, child.age),
                format!("child:age:{}", index),
            ),
            InlineKeyboardButton::callback("✖".to_string(), format!("child:del:{}", index)),
        ]);
    }

    keyboard.push(vec![InlineKeyboardButton::callback(
        "Continuar ➡️".to_string(),
        "guests:continue".to_string(),
    )]);
    keyboard.push(vec![InlineKeyboardButton::callback(
        "⟵ Voltar".to_string(),
        "back".to_string(),
    )]);

    InlineKeyboardMarkup::new(keyboard)
}

async fn show_guest_count(
    bot: &Bot,
    chat_id: ChatId,
    session: &BookingSession,
    edit: Option<MessageId>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let capacity = room_capacity(session);
    let text = guest_count_text(&session.guest_draft, capacity);
    let markup = guest_count_keyboard(&session.guest_draft, capacity);
    match edit {
        Some(message_id) => {
            bot.edit_message_text(chat_id, message_id, text)
                .reply_markup(markup)
                .await?;
        }
        None => {
            bot.send_message(chat_id, text)
                .reply_markup(ReplyMarkup::InlineKeyboard(markup))
                .await?;
        }
    }
    Ok(())
}

fn age_keyboard(index: usize) -> InlineKeyboardMarkup {
    let mut keyboard: Vec<Vec<InlineKeyboardButton>> = Vec::new();
    let mut row: Vec<InlineKeyboardButton> = Vec::new();
    for age in 0..=MAX_CHILD_AGE {
        row.push(InlineKeyboardButton::callback(
            age.to_string(),
            format!("child:set:{}:{}", index, age),
        ));
        if row.len() == 6 {
            keyboard.push(row.clone());
            row.clear();
        }
    }
    if !row.is_empty() {
        keyboard.push(row);
    }
    InlineKeyboardMarkup::new(keyboard)
}

async fn show_age_grid(
    bot: &Bot,
    chat_id: ChatId,
    index: usize,
    message_id: MessageId,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    bot.edit_message_text(
        chat_id,
        message_id,
        format!("Idade da criança {} (0 a {} anos):", index + 1, MAX_CHILD_AGE),
    )
    .reply_markup(age_keyboard(index))
    .await?;
    Ok(())
}

// --- text prompts (guest form and card form) ------------------------------

fn prompt_text(prompt: Prompt) -> &'static str {
    match prompt {
        Prompt::FirstName => "Nome *",
        Prompt::LastName => "Sobrenome *",
        Prompt::Email => "E-mail *",
        Prompt::Phone => "Telefone *",
        Prompt::CardNumber => "Número do Cartão * (16 dígitos, sem espaços)",
        Prompt::CardHolder => "Nome no Cartão *",
        Prompt::Expiry => "Validade * (MM/AA)",
        Prompt::Cvv => "CVV *",
    }
}

async fn ask(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut BookingSession,
    prompt: Prompt,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    session.awaiting = Some(prompt);
    bot.send_message(chat_id, prompt_text(prompt)).await?;
    Ok(())
}

async fn handle_prompt_input(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut BookingSession,
    prompt: Prompt,
    text: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let validation: Result<(), FieldError> = match prompt {
        Prompt::FirstName | Prompt::LastName | Prompt::Phone => flow::validate_required(text),
        Prompt::Email => flow::validate_email(text),
        Prompt::CardNumber => flow::validate_card_number(text),
        Prompt::CardHolder => flow::validate_card_holder(text),
        Prompt::Expiry => flow::validate_expiry(text),
        Prompt::Cvv => flow::validate_cvv(text),
    };
    if let Err(err) = validation {
        bot.send_message(chat_id, format!("⚠️ {}\n{}", err, prompt_text(prompt)))
            .await?;
        return Ok(());
    }

    let value = text.to_string();
    match prompt {
        Prompt::FirstName => {
            session.guest_draft.first_name = Some(value);
            ask(bot, chat_id, session, Prompt::LastName).await
        }
        Prompt::LastName => {
            session.guest_draft.last_name = Some(value);
            ask(bot, chat_id, session, Prompt::Email).await
        }
        Prompt::Email => {
            session.guest_draft.email = Some(value);
            ask(bot, chat_id, session, Prompt::Phone).await
        }
        Prompt::Phone => finish_guest_form(bot, chat_id, session, value).await,
        Prompt::CardNumber => {
            session.payment_draft.card_number = Some(value);
            ask(bot, chat_id, session, Prompt::CardHolder).await
        }
        Prompt::CardHolder => {
            session.payment_draft.card_holder = Some(value);
            ask(bot, chat_id, session, Prompt::Expiry).await
        }
        Prompt::Expiry => {
            session.payment_draft.expiry_date = Some(value);
            ask(bot, chat_id, session, Prompt::Cvv).await
        }
        Prompt::Cvv => finish_payment_form(bot, chat_id, session, value).await,
    }
}

async fn finish_guest_form(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut BookingSession,
    phone: String,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    session.awaiting = None;

    let capacity = room_capacity(session);
    let adults = session.guest_draft.adults;
    let children = session.guest_draft.children.clone();
    if let Err(err) = flow::validate_guest_count(adults, children.len(), capacity) {
        bot.send_message(chat_id, format!("⚠️ {}", err)).await?;
        return enter_step(bot, chat_id, session, Step::GuestInformation).await;
    }

    let guest_info = GuestInfo {
        first_name: session.guest_draft.first_name.take().unwrap_or_default(),
        last_name: session.guest_draft.last_name.take().unwrap_or_default(),
        email: session.guest_draft.email.take().unwrap_or_default(),
        phone,
    };
    session.state.update(BookingUpdate {
        adults: Some(adults),
        children: Some(children),
        guest_info: Some(guest_info),
        ..Default::default()
    });
    enter_step(bot, chat_id, session, Step::BookingSummary).await
}

async fn finish_payment_form(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut BookingSession,
    cvv: String,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    session.awaiting = None;

    let payment_info = PaymentInfo {
        card_number: session.payment_draft.card_number.take().unwrap_or_default(),
        card_holder: session.payment_draft.card_holder.take().unwrap_or_default(),
        expiry_date: session.payment_draft.expiry_date.take().unwrap_or_default(),
        cvv,
    };

    bot.send_message(chat_id, "🔒 Processando pagamento...").await?;
    let PaymentOutcome::Succeeded = flow::process_payment().await;

    session.state.update(BookingUpdate {
        payment_info: Some(payment_info),
        ..Default::default()
    });
    enter_step(bot, chat_id, session, Step::Confirmation).await
}

// --- summary, payment and confirmation ------------------------------------

fn summary_text(state: &BookingState) -> String {
    let record = state.record();
    let (Some(room), Some(info)) = (&record.selected_room, &record.guest_info) else {
        return String::new();
    };
    let nights = state.nights();
    let breakdown = state.breakdown();

    let mut text = format!(
        "📋 Resumo da Reserva\nRevise os detalhes antes de prosseguir\n\n🛏 Quarto: {}\n",
        room.name
    );
    if let Some(check_in) = record.check_in {
        text.push_str(&format!(
            "📅 Check-in: {} (a partir das 14:00)\n",
            format_date_pt(check_in.date())
        ));
    }
    if let Some(check_out) = record.check_out {
        text.push_str(&format!(
            "📅 Check-out: {} (até às 12:00)\n",
            format_date_pt(check_out.date())
        ));
    }
    text.push_str(&format!(
        "👥 Hóspedes: {} adulto(s), {} criança(s) — {} pessoa(s)\n",
        record.adults,
        record.children.len(),
        record.guest_count()
    ));
    for (index, child) in record.children.iter().enumerate() {
        text.push_str(&format!("   Criança {}: {} anos\n", index + 1, child.age));
    }
    text.push_str(&format!(
        "\n👤 Responsável\n{} {}\n✉️ {}\n📞 {}\n",
        info.first_name, info.last_name, info.email, info.phone
    ));
    text.push_str(&format!(
        "\n💰 Resumo de Preços\n{} x {} noite(s): {}\nTaxa de serviço: {}\nImpostos: {}\nTotal: {}",
        format_brl(room.price),
        nights,
        format_brl(breakdown.subtotal),
        format_brl(breakdown.service_fee),
        format_brl(breakdown.taxes),
        format_brl(breakdown.total)
    ));
    text
}

async fn show_summary(
    bot: &Bot,
    chat_id: ChatId,
    session: &BookingSession,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "Confirmar e Pagar ➡️".to_string(),
            "summary:pay".to_string(),
        )],
        vec![InlineKeyboardButton::callback("⟵ Voltar".to_string(), "back".to_string())],
    ]);
    bot.send_message(chat_id, summary_text(&session.state))
        .reply_markup(ReplyMarkup::InlineKeyboard(keyboard))
        .await?;
    Ok(())
}

async fn show_payment(
    bot: &Bot,
    chat_id: ChatId,
    session: &mut BookingSession,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    session.payment_draft = PaymentDraft::default();
    let breakdown = session.state.breakdown();
    let text = format!(
        "💳 Pagamento\nConclua sua reserva com segurança\n\nSubtotal: {}\nTaxa de serviço: {}\nImpostos: {}\nTotal a Pagar: {}\n\n🔒 Seus dados são protegidos com criptografia de ponta a ponta.",
        format_brl(breakdown.subtotal),
        format_brl(breakdown.service_fee),
        format_brl(breakdown.taxes),
        format_brl(breakdown.total)
    );
    bot.send_message(chat_id, text)
        .reply_markup(ReplyMarkup::InlineKeyboard(back_keyboard()))
        .await?;
    ask(bot, chat_id, session, Prompt::CardNumber).await
}

async fn show_confirmation(
    bot: &Bot,
    chat_id: ChatId,
    session: &BookingSession,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let record = session.state.record();
    let reference = booking_reference(Utc::now().timestamp_millis());
    info!("chat {}: booking confirmed as {}", chat_id, reference);
    let mut text = format!("✅ Reserva Confirmada!\nCódigo da reserva: {}\n\n", reference);
    if let Some(room) = &record.selected_room {
        text.push_str(&format!("🛏 {}\n", room.name));
    }
    if let Some(check_in) = record.check_in {
        text.push_str(&format!("📅 Check-in: {}\n", format_date_pt(check_in.date())));
    }
    if let Some(check_out) = record.check_out {
        text.push_str(&format!("📅 Check-out: {}\n", format_date_pt(check_out.date())));
    }
    text.push_str(&format!(
        "👥 {} adulto(s), {} criança(s)\n",
        record.adults,
        record.children.len()
    ));
    if let Some(payment) = &record.payment_info {
        let last4 = payment
            .card_number
            .get(payment.card_number.len().saturating_sub(4)..)
            .unwrap_or_default();
        text.push_str(&format!(
            "💳 {} — cartão final {} (validade {})\n",
            payment.card_holder, last4, payment.expiry_date
        ));
    }
    if let Some(info) = &record.guest_info {
        text.push_str(&format!(
            "\n📧 E-mail de Confirmação Enviado\nEnviamos os detalhes da reserva para {}.",
            info.email
        ));
    }
    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "🏠 Nova reserva".to_string(),
        "restart".to_string(),
    )]]);
    bot.send_message(chat_id, text)
        .reply_markup(ReplyMarkup::InlineKeyboard(keyboard))
        .await?;
    Ok(())
}

// --- shared helpers -------------------------------------------------------

fn back_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "⟵ Voltar".to_string(),
        "back".to_string(),
    )]])
}

fn format_date_pt(date: NaiveDate) -> String {
    format!("{:02} de {} de {}", date.day(), month_name(date.month()), date.year())
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "Janeiro",
        2 => "Fevereiro",
        3 => "Março",
        4 => "Abril",
        5 => "Maio",
        6 => "Junho",
        7 => "Julho",
        8 => "Agosto",
        9 => "Setembro",
        10 => "Outubro",
        11 => "Novembro",
        12 => "Dezembro",
        _ => "",
    }
}

fn days_in_month(month: u32, year: i32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}
