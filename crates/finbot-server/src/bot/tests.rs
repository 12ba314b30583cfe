//! Bot state machine tests

use std::sync::Mutex;
use std::time::Duration;

use super::*;
use finbot_core::ai::{AIClient, Extractor, MockBackend};
use finbot_core::linking::generate_link_code;
use finbot_core::{Category, Database, ExpenseCandidate, Notifier};

const CHAT: &str = "5551234";

/// Everything the bot sent, in order
#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Message(String, BotReply),
    Edit(String, i64, BotReply),
    Callback(String, String),
    Document(String, String, Vec<u8>),
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    downloads: Mutex<Vec<String>>,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(&self, chat_id: &str, reply: &BotReply) -> Result<i64> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(Sent::Message(chat_id.to_string(), reply.clone()));
        Ok(sent.len() as i64)
    }

    async fn edit_message(&self, chat_id: &str, message_id: i64, reply: &BotReply) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Edit(chat_id.to_string(), message_id, reply.clone()));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Callback(callback_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_document(&self, chat_id: &str, file_name: &str, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.sent.lock().unwrap().push(Sent::Document(
            chat_id.to_string(),
            file_name.to_string(),
            bytes,
        ));
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.downloads.lock().unwrap().push(file_id.to_string());
        Ok(vec![0xFF, 0xD8, 0xFF, 0xE0])
    }
}

struct Harness {
    bot: BotHandler,
    transport: Arc<RecordingTransport>,
    ingestor: Ingestor,
    mock: MockBackend,
    user_id: i64,
}

fn harness_with(mock: MockBackend) -> Harness {
    let db = Database::in_memory().unwrap();
    let user = db.create_user("Asha", "asha@example.com", "hash").unwrap();
    let extractor = Extractor::new(AIClient::Mock(mock.clone()), Duration::from_secs(5));
    let ingestor = Ingestor::new(db, Some(extractor), Notifier::new());
    let transport = Arc::new(RecordingTransport::default());
    Harness {
        bot: BotHandler::new(ingestor.clone(), transport.clone()),
        transport,
        ingestor,
        mock,
        user_id: user.id,
    }
}

fn harness() -> Harness {
    harness_with(MockBackend::new())
}

impl Harness {
    fn link(&self) {
        let code = generate_link_code(
            self.ingestor.db(),
            self.user_id,
            chrono::Duration::minutes(10),
        )
        .unwrap();
        finbot_core::linking::consume_link_code(self.ingestor.db(), &code.code, CHAT).unwrap();
    }
}

fn text(text: &str) -> ChatUpdate {
    ChatUpdate::from_message(CHAT, text)
}

// ========== Update Classification ==========

#[test]
fn test_from_message_classifies_commands() {
    assert_eq!(
        ChatUpdate::from_message("1", "/start 123456"),
        ChatUpdate::Command {
            chat_id: "1".into(),
            name: "start".into(),
            args: "123456".into(),
        }
    );
    assert_eq!(
        ChatUpdate::from_message("1", "/Report@FinBot"),
        ChatUpdate::Command {
            chat_id: "1".into(),
            name: "report".into(),
            args: String::new(),
        }
    );
    assert_eq!(
        ChatUpdate::from_message("1", " 100 momos "),
        ChatUpdate::Text {
            chat_id: "1".into(),
            text: "100 momos".into(),
        }
    );
}

// ========== Linking ==========

#[tokio::test]
async fn test_start_without_code_shows_welcome() {
    let h = harness();
    assert_eq!(h.bot.handle(&text("/start")).await.text, WELCOME);
}

#[tokio::test]
async fn test_start_with_code_links_chat() {
    let h = harness();
    let code = generate_link_code(h.ingestor.db(), h.user_id, chrono::Duration::minutes(10))
        .unwrap();

    let reply = h.bot.handle(&text(&format!("/start {}", code.code))).await;
    assert!(reply.text.starts_with("Account Linked Successfully!"));
    assert!(reply.text.contains("Hello Asha"));

    let user = h.ingestor.db().get_user(h.user_id).unwrap().unwrap();
    assert_eq!(user.telegram_chat_id.as_deref(), Some(CHAT));
}

#[tokio::test]
async fn test_start_with_bad_code() {
    let h = harness();
    assert_eq!(h.bot.handle(&text("/start 000000")).await.text, INVALID_CODE);
}

// ========== Text Ingestion ==========

#[tokio::test]
async fn test_text_expense_for_linked_chat() {
    let h = harness();
    h.link();

    let reply = h.bot.handle(&text("100 momos")).await;
    assert!(reply.text.starts_with("Expense Added!"));
    assert!(reply.text.contains("Amount: Rs. 100"));
    assert!(reply.text.contains("Category: Food"));
    assert!(reply.delete_button.is_some());

    let expense = h
        .ingestor
        .db()
        .get_expense(reply.delete_button.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(expense.title, "momos");
    assert_eq!(expense.category, Category::Food);
}

#[tokio::test]
async fn test_unlinked_text_never_calls_extractor() {
    let h = harness();

    h.bot.dispatch(text("100 momos")).await.unwrap();

    assert_eq!(h.mock.calls(), 0);
    assert_eq!(
        h.transport.sent(),
        vec![Sent::Message(CHAT.into(), BotReply::text(NOT_LINKED))]
    );
}

#[tokio::test]
async fn test_unparseable_text_reply() {
    let h = harness_with(MockBackend::failing());
    h.link();

    let reply = h.bot.handle(&text("blah")).await;
    assert_eq!(reply.text, COULD_NOT_UNDERSTAND);
    assert_eq!(h.ingestor.db().count_expenses(h.user_id).unwrap(), 0);
}

#[tokio::test]
async fn test_dispatch_text_edits_placeholder() {
    let h = harness();
    h.link();

    h.bot.dispatch(text("250 pizza")).await.unwrap();

    let sent = h.transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], Sent::Message(CHAT.into(), BotReply::text(ANALYZING)));
    match &sent[1] {
        Sent::Edit(chat, message_id, reply) => {
            assert_eq!(chat, CHAT);
            assert_eq!(*message_id, 1);
            assert!(reply.text.contains("Item: pizza"));
        }
        other => panic!("Expected edit, got {:?}", other),
    }
}

// ========== Photo Ingestion ==========

#[tokio::test]
async fn test_photo_for_unlinked_chat_skips_download() {
    let h = harness();

    let update = ChatUpdate::Photo {
        chat_id: CHAT.into(),
        file_id: "file-1".into(),
        caption: None,
    };
    assert_eq!(h.bot.handle(&update).await.text, NOT_LINKED);
    assert!(h.transport.downloads().is_empty());
}

#[tokio::test]
async fn test_photo_scanned() {
    let h = harness_with(MockBackend::with_response(ExpenseCandidate {
        item: Some("Cafe Blue".into()),
        amount: Some(240.0),
        category: Some("Food".into()),
        mode: Some("Online".into()),
    }));
    h.link();

    let update = ChatUpdate::Photo {
        chat_id: CHAT.into(),
        file_id: "file-1".into(),
        caption: Some("lunch".into()),
    };
    h.bot.dispatch(update).await.unwrap();

    assert_eq!(h.transport.downloads(), vec!["file-1".to_string()]);
    let sent = h.transport.sent();
    assert_eq!(sent[0], Sent::Message(CHAT.into(), BotReply::text(SCANNING)));
    match &sent[1] {
        Sent::Edit(_, _, reply) => {
            assert!(reply.text.starts_with("Bill Scanned!"));
            assert!(reply.text.contains("Item: Cafe Blue"));
            assert!(reply.text.contains("Mode: Online"));
        }
        other => panic!("Expected edit, got {:?}", other),
    }
}

#[tokio::test]
async fn test_photo_extraction_failure() {
    let h = harness_with(MockBackend::failing());
    h.link();

    let update = ChatUpdate::Photo {
        chat_id: CHAT.into(),
        file_id: "file-1".into(),
        caption: None,
    };
    assert_eq!(h.bot.handle(&update).await.text, COULD_NOT_READ_BILL);
}

// ========== Delete Button ==========

#[tokio::test]
async fn test_delete_callback() {
    let h = harness();
    h.link();
    let added = h.bot.handle(&text("100 momos")).await;
    let id = added.delete_button.unwrap();

    let update = ChatUpdate::Callback {
        chat_id: CHAT.into(),
        callback_id: "cb-1".into(),
        message_id: 7,
        data: format!("{}{}", DELETE_PREFIX, id),
    };
    h.bot.dispatch(update).await.unwrap();

    let sent = h.transport.sent();
    assert_eq!(sent[0], Sent::Callback("cb-1".into(), "Expense Deleted!".into()));
    match &sent[1] {
        Sent::Edit(_, message_id, reply) => {
            assert_eq!(*message_id, 7);
            assert_eq!(reply.text, EXPENSE_DELETED);
        }
        other => panic!("Expected edit, got {:?}", other),
    }
    assert!(h.ingestor.db().get_expense(id).unwrap().is_none());
}

#[tokio::test]
async fn test_delete_callback_checks_ownership() {
    let h = harness();
    h.link();
    let other = h
        .ingestor
        .db()
        .create_user("Ravi", "ravi@example.com", "hash")
        .unwrap();
    let foreign = h
        .ingestor
        .ingest_manual(
            other.id,
            finbot_core::ManualEntry {
                title: Some("Rent".into()),
                amount: Some(500.0),
                ..Default::default()
            },
        )
        .unwrap();

    let update = ChatUpdate::Callback {
        chat_id: CHAT.into(),
        callback_id: "cb-2".into(),
        message_id: 3,
        data: format!("DELETE_{}", foreign.id),
    };
    h.bot.dispatch(update).await.unwrap();

    // Toast only, message left alone
    let sent = h.transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(matches!(&sent[0], Sent::Callback(_, notice) if notice.contains("not found")));
    assert!(h.ingestor.db().get_expense(foreign.id).unwrap().is_some());
}

// ========== Report ==========

#[tokio::test]
async fn test_report_requires_link() {
    let h = harness();
    assert_eq!(h.bot.handle(&text("/report")).await.text, LINK_FIRST);
}

#[tokio::test]
async fn test_report_without_expenses() {
    let h = harness();
    h.link();
    let reply = h.bot.handle(&text("/report")).await;
    assert_eq!(reply.text, NO_EXPENSES);
    assert!(reply.document.is_none());
}

#[tokio::test]
async fn test_report_sends_pdf_document() {
    let h = harness();
    h.link();
    h.bot.handle(&text("100 momos")).await;

    h.bot.dispatch(text("/report")).await.unwrap();

    let sent = h.transport.sent();
    assert!(matches!(&sent[0], Sent::Message(_, reply) if reply.text == MAKING_REPORT));
    match &sent[1] {
        Sent::Document(chat, name, bytes) => {
            assert_eq!(chat, CHAT);
            assert_eq!(name, STATEMENT_FILENAME);
            assert!(bytes.starts_with(b"%PDF"));
        }
        other => panic!("Expected document, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_command_hint() {
    let h = harness();
    assert_eq!(h.bot.handle(&text("/dance")).await.text, UNKNOWN_COMMAND);
    assert_eq!(h.bot.handle(&text("/help")).await.text, HELP);
}

#[test]
fn test_otp_message() {
    let reply = otp_message("4821");
    assert!(reply.markdown);
    assert!(reply.text.contains("Your OTP is: *4821*"));
}
