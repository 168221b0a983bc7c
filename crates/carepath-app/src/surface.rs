//! Line-oriented chat surface.
//!
//! Reads user lines, drives one [`ConversationSession`], and prints the log
//! as it grows. Slash commands cover what a graphical surface would offer as
//! buttons: reconnect, clear, stats, pickers, and booking a doctor.

use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use chrono::Local;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use carepath_chat::{
    Affordance, BookingRequest, ChatBackend, ChatError, ClarificationOutcome,
    ConversationSession, HandoffSlot, TurnOutcome,
};
use carepath_core::types::{Connectivity, Message, Sender};

pub type SurfaceResult<T = ()> = Result<T, Box<dyn Error>>;

const HELP: &str = "Commands:
  /retry            reconnect to the assistant
  /clear            start the conversation over
  /stats            show session statistics
  /pick N           choose option N of the latest picker
  /date YYYY-MM-DD  choose a date when one is asked for
  /book N           book recommended doctor N
  /help             show this help
  /quit             leave";

/// A parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Retry,
    Clear,
    Stats,
    Help,
    Pick(usize),
    Date(&'a str),
    Book(usize),
    Say(&'a str),
    Invalid(&'a str),
}

/// Parse one line. Option numbers are 1-based on screen and 0-based here.
fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    if !line.starts_with('/') {
        return Command::Say(line);
    }
    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (line, ""),
    };
    let index = || arg.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
    match name {
        "/quit" | "/exit" => Command::Quit,
        "/retry" => Command::Retry,
        "/clear" => Command::Clear,
        "/stats" => Command::Stats,
        "/help" => Command::Help,
        "/pick" => index().map_or(Command::Invalid(line), Command::Pick),
        "/book" => index().map_or(Command::Invalid(line), Command::Book),
        "/date" if !arg.is_empty() => Command::Date(arg),
        _ => Command::Invalid(line),
    }
}

pub struct ChatSurface<R, W> {
    session: ConversationSession,
    backend: Arc<dyn ChatBackend>,
    handoff: Box<dyn HandoffSlot>,
    patient_id: i64,
    input: Lines<R>,
    out: W,
}

impl<R, W> ChatSurface<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(
        session: ConversationSession,
        backend: Arc<dyn ChatBackend>,
        handoff: Box<dyn HandoffSlot>,
        patient_id: i64,
        input: R,
        out: W,
    ) -> Self {
        Self {
            session,
            backend,
            handoff,
            patient_id,
            input: input.lines(),
            out,
        }
    }

    /// Probe connectivity, print the greeting, and loop until `/quit` or EOF.
    /// The session is ended on the way out, even when the loop fails.
    pub async fn run(&mut self) -> SurfaceResult {
        let result = self.converse().await;
        let ended = self.session.end();
        result?;
        ended?;
        Ok(())
    }

    async fn converse(&mut self) -> SurfaceResult {
        self.retry().await?;
        self.show_all()?;

        while let Some(line) = self.prompt("> ").await? {
            match parse_command(&line) {
                Command::Quit => break,
                Command::Say("") => {}
                Command::Say(text) => self.say(text).await?,
                Command::Retry => self.retry().await?,
                Command::Clear => {
                    let cleared = self.session.clear();
                    if self.notice(cleared)?.is_some() {
                        self.show_all()?;
                    }
                }
                Command::Stats => self.stats()?,
                Command::Help => writeln!(self.out, "{}", HELP)?,
                Command::Pick(index) => self.pick(index).await?,
                Command::Date(date) => self.date(date).await?,
                Command::Book(index) => self.book(index).await?,
                Command::Invalid(input) => {
                    writeln!(self.out, "Unknown command: {} (try /help)", input)?
                }
            }
        }
        Ok(())
    }

    async fn prompt(&mut self, label: &str) -> SurfaceResult<Option<String>> {
        write!(self.out, "{}", label)?;
        self.out.flush()?;
        Ok(self.input.next_line().await?.map(|l| l.trim().to_string()))
    }

    /// Print a user-facing error and yield `None`. Lock poisoning is fatal.
    fn notice<T>(&mut self, result: Result<T, ChatError>) -> SurfaceResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(ChatError::Disconnected) => {
                writeln!(
                    self.out,
                    "The assistant is offline. Use /retry to reconnect."
                )?;
                Ok(None)
            }
            Err(e) => {
                writeln!(self.out, "! {}", e)?;
                Ok(None)
            }
        }
    }

    // ---- Rendering ----

    fn show_message(&mut self, message: &Message) -> SurfaceResult {
        match message.sender() {
            Sender::User => writeln!(self.out, "you: {}", message.text())?,
            Sender::Assistant => {
                writeln!(self.out, "assistant: {}", message.text())?;
                let follow_up = message.as_assistant().and_then(|r| r.follow_up.as_ref());
                if let Some(follow_up) = follow_up.filter(|f| f.requires_further_clarification) {
                    for question in &follow_up.additional_questions {
                        writeln!(self.out, "  ? {}", question)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn show_all(&mut self) -> SurfaceResult {
        for message in self.session.messages()? {
            self.show_message(&message)?;
        }
        Ok(())
    }

    fn show_latest(&mut self) -> SurfaceResult {
        if let Some(message) = self.session.messages()?.last() {
            self.show_message(message)?;
        }
        Ok(())
    }

    fn show_affordance(&mut self, affordance: &Affordance) -> SurfaceResult {
        match affordance {
            Affordance::NoAffordance => {}
            Affordance::LocationPicker(options) => {
                writeln!(self.out, "Choose a location with /pick N:")?;
                for (i, option) in options.iter().enumerate() {
                    writeln!(self.out, "  {}. {}", i + 1, option)?;
                }
            }
            Affordance::TimeSlotPicker(options) => {
                writeln!(self.out, "Choose a time slot with /pick N:")?;
                for (i, option) in options.iter().enumerate() {
                    writeln!(self.out, "  {}. {}", i + 1, option)?;
                }
            }
            Affordance::DatePicker(picker) => {
                writeln!(
                    self.out,
                    "Choose a date between {} and {} with /date YYYY-MM-DD, or /pick N:",
                    picker.min_date, picker.max_date
                )?;
                for (i, offset) in picker.quick_offsets.iter().enumerate() {
                    writeln!(self.out, "  {}. {}", i + 1, picker.quick_date(*offset))?;
                }
            }
            Affordance::DoctorList(doctors) => {
                writeln!(self.out, "Recommended doctors, book one with /book N:")?;
                for (i, doctor) in doctors.iter().enumerate() {
                    writeln!(self.out, "  {}. {}", i + 1, doctor.summary())?;
                }
            }
        }
        Ok(())
    }

    // ---- Commands ----

    async fn retry(&mut self) -> SurfaceResult {
        match self.session.check_connection().await? {
            Connectivity::Connected => writeln!(self.out, "Connected to the assistant.")?,
            Connectivity::Disconnected => writeln!(
                self.out,
                "Unable to connect to AI service. Use /retry to try again."
            )?,
            Connectivity::Unknown => {}
        }
        Ok(())
    }

    fn stats(&mut self) -> SurfaceResult {
        let stats = self.session.stats()?;
        writeln!(
            self.out,
            "{} | {} messages | {} doctors recommended",
            stats.duration_label(Local::now()),
            stats.message_count,
            stats.doctors_recommended_count
        )?;
        Ok(())
    }

    async fn say(&mut self, text: &str) -> SurfaceResult {
        let result = self.session.send(text).await;
        let Some(outcome) = self.notice(result)? else {
            return Ok(());
        };
        match outcome {
            TurnOutcome::Replied { affordance, .. } => {
                self.show_latest()?;
                self.show_affordance(&affordance)?;
            }
            TurnOutcome::ClarificationRequested { questions, .. } => {
                self.show_latest()?;
                self.clarify(&questions).await?;
            }
            TurnOutcome::Failed { .. } => self.show_latest()?,
            TurnOutcome::Discarded => {}
        }
        Ok(())
    }

    /// Ask for an elaboration until it is answered or the user gives up.
    async fn clarify(&mut self, questions: &[String]) -> SurfaceResult {
        writeln!(self.out, "To help you better, please tell me:")?;
        for question in questions {
            writeln!(self.out, "  - {}", question)?;
        }
        writeln!(self.out, "(an empty line cancels)")?;

        loop {
            let line = match self.prompt("details> ").await? {
                Some(line) if !line.is_empty() => line,
                _ => {
                    let cancelled = self.session.cancel_clarification();
                    self.notice(cancelled)?;
                    writeln!(self.out, "Clarification cancelled.")?;
                    return Ok(());
                }
            };
            match self.session.submit_clarification(&line).await {
                Ok(ClarificationOutcome::Answered { affordance, .. }) => {
                    self.show_latest()?;
                    self.show_affordance(&affordance)?;
                    return Ok(());
                }
                Ok(ClarificationOutcome::Discarded) => return Ok(()),
                Err(ChatError::ClarificationInvalid(msg) | ChatError::ClarificationFailed(msg)) => {
                    writeln!(self.out, "! {}", msg)?;
                }
                Err(e) => {
                    self.notice::<()>(Err(e))?;
                    return Ok(());
                }
            }
        }
    }

    async fn pick(&mut self, index: usize) -> SurfaceResult {
        let affordance = self.session.latest_affordance(Local::now().date_naive())?;
        match affordance.selection(index) {
            Some(text) => self.say(&text).await,
            None if matches!(affordance, Affordance::DoctorList(_)) => {
                writeln!(self.out, "Use /book N to book a recommended doctor.")?;
                Ok(())
            }
            None => {
                writeln!(self.out, "There is no option {} to pick.", index + 1)?;
                Ok(())
            }
        }
    }

    async fn date(&mut self, input: &str) -> SurfaceResult {
        let Affordance::DatePicker(picker) =
            self.session.latest_affordance(Local::now().date_naive())?
        else {
            writeln!(self.out, "No date is being asked for right now.")?;
            return Ok(());
        };
        if let Some(text) = self.notice(picker.choose(input))? {
            self.say(&text).await?;
        }
        Ok(())
    }

    async fn book(&mut self, index: usize) -> SurfaceResult {
        let doctors = self.session.latest_doctors()?;
        let Some(doctor) = doctors.get(index) else {
            writeln!(self.out, "There is no recommended doctor {}.", index + 1)?;
            return Ok(());
        };
        let booked = self.session.book_with(doctor, self.handoff.as_ref());
        if self.notice(booked)?.is_none() {
            return Ok(());
        }
        self.show_latest()?;
        self.booking_flow().await
    }

    /// Booking surface: consume the handed-off doctor, collect the details,
    /// and submit the appointment.
    async fn booking_flow(&mut self) -> SurfaceResult {
        let taken = self.handoff.take().map_err(ChatError::from);
        let doctor = match self.notice(taken)? {
            Some(Some(doctor)) => doctor,
            Some(None) => {
                writeln!(self.out, "No doctor selected for booking.")?;
                return Ok(());
            }
            None => return Ok(()),
        };
        writeln!(self.out, "Booking with {}", doctor.summary())?;
        writeln!(self.out, "(an empty line aborts; use /book again to restart)")?;

        let picker = self
            .session
            .settings()
            .resolver
            .date_picker(Local::now().date_naive());
        let label = format!("Date ({} to {}): ", picker.min_date, picker.max_date);
        let date = loop {
            let Some(line) = self.prompt(&label).await?.filter(|l| !l.is_empty()) else {
                writeln!(self.out, "Booking aborted.")?;
                return Ok(());
            };
            if let Some(date) = self.notice(picker.validate(&line))? {
                break date;
            }
        };

        let Some(slot) = self
            .prompt("Time slot (e.g. 09:00 AM - 10:00 AM): ")
            .await?
            .filter(|l| !l.is_empty())
        else {
            writeln!(self.out, "Booking aborted.")?;
            return Ok(());
        };
        let reason = self.prompt("Reason for visit: ").await?.unwrap_or_default();
        let notes = self
            .prompt("Additional notes (optional): ")
            .await?
            .unwrap_or_default();

        let request = BookingRequest::from_selection(
            &doctor,
            self.patient_id,
            date,
            &slot,
            &reason,
            &notes,
        );
        let Some(request) = self.notice(request)? else {
            writeln!(self.out, "Booking not submitted.")?;
            return Ok(());
        };

        match self.backend.book_appointment(&request).await {
            Ok(confirmation) => {
                tracing::info!(doctor_id = request.doctor_id, date = %request.appointment_date, "Appointment booked");
                writeln!(
                    self.out,
                    "{}",
                    confirmation
                        .message
                        .unwrap_or_else(|| "Appointment booked successfully".to_string())
                )?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Appointment booking failed");
                writeln!(self.out, "! Booking failed: {}", e)?;
            }
        }
        Ok(())
    }
}
