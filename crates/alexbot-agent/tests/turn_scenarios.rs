// End-to-end turns against scripted providers.
// No network: the chat model replays canned responses and media calls
// return fixed bytes.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use alexbot_agent::artifact::{ArtifactKind, ArtifactStore};
use alexbot_agent::ingest::InboundAttachment;
use alexbot_agent::pipeline::TurnSettings;
use alexbot_agent::provider::{
    ChatRequest, ChatResponse, GeneratedImage, ImageRequest, ImageStyle, LlmProvider,
    MediaProvider, ProviderError, Role, SpeechRequest, ToolCall, Voice,
};
use alexbot_agent::tools::ToolError;
use alexbot_agent::transcript::Transcript;
use alexbot_agent::{
    begin_turn, handle_command, handle_turn, ErrorKind, InboundTurn, SessionRegistry, TurnContext,
    TurnProcessor,
};
use alexbot_core::ConversationKey;

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 1, 2, 3];

#[derive(Default)]
struct ScriptedLlm {
    script: Mutex<VecDeque<Result<ChatResponse, ProviderError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    fn replying(responses: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(err: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::from([Err(err)])),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().unwrap().push(req.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Parse("script exhausted".into())))
    }
}

#[derive(Default)]
struct FakeMedia {
    image_requests: Mutex<Vec<ImageRequest>>,
    speech_requests: Mutex<Vec<SpeechRequest>>,
    downloads: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaProvider for FakeMedia {
    async fn generate_image(&self, req: &ImageRequest) -> Result<GeneratedImage, ProviderError> {
        self.image_requests.lock().unwrap().push(req.clone());
        Ok(GeneratedImage::Url("https://images.example/fox.png".into()))
    }

    async fn synthesize_speech(&self, req: &SpeechRequest) -> Result<Vec<u8>, ProviderError> {
        self.speech_requests.lock().unwrap().push(req.clone());
        Ok(b"ID3".to_vec())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.downloads.lock().unwrap().push(url.to_string());
        Ok(PNG_BYTES.to_vec())
    }
}

fn text(content: &str) -> ChatResponse {
    ChatResponse {
        content: content.to_string(),
        model: "chat-model".to_string(),
        stop_reason: "stop".to_string(),
        ..Default::default()
    }
}

fn tool_call(name: &str, input: serde_json::Value) -> ChatResponse {
    ChatResponse {
        model: "chat-model".to_string(),
        stop_reason: "tool_calls".to_string(),
        tool_calls: vec![ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            input,
        }],
        ..Default::default()
    }
}

fn settings() -> TurnSettings {
    TurnSettings {
        system_message: "You are Alex.".to_string(),
        chat_model: "chat-model".to_string(),
        vision_model: "vision-model".to_string(),
        max_tokens: 512,
        max_history: 20,
    }
}

struct Harness {
    llm: Arc<ScriptedLlm>,
    media: Arc<FakeMedia>,
    processor: TurnProcessor,
    _dir: tempfile::TempDir,
}

fn harness(llm: Arc<ScriptedLlm>) -> Harness {
    harness_with(llm, settings())
}

fn harness_with(llm: Arc<ScriptedLlm>, settings: TurnSettings) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let media = Arc::new(FakeMedia::default());
    let processor = TurnProcessor::new(
        llm.clone(),
        media.clone(),
        ArtifactStore::new(dir.path(), "%Y%m%d-%H%M%S"),
        settings,
    );
    Harness {
        llm,
        media,
        processor,
        _dir: dir,
    }
}

fn entries(t: &Transcript) -> Vec<(Role, String)> {
    t.entries()
        .iter()
        .map(|m| (m.role, m.content.as_text()))
        .collect()
}

#[tokio::test]
async fn plain_message_gets_direct_reply() {
    let h = harness(ScriptedLlm::replying(vec![text("Hi there!")]));
    let mut transcript = Transcript::new();

    let outcome = h
        .processor
        .process(&mut transcript, &InboundTurn::new("Sam", "Hello"))
        .await
        .unwrap();

    assert_eq!(
        entries(&transcript),
        vec![
            (Role::System, "You are Alex.\n\nYou are talking to Sam.".to_string()),
            (Role::User, "Hello".to_string()),
            (Role::Assistant, "Hi there!".to_string()),
        ]
    );
    assert_eq!(outcome.segments(), vec!["Hi there!"]);
    assert!(outcome.artifacts.is_empty());

    let requests = h.llm.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "chat-model");
    assert_eq!(requests[0].tools.len(), 3);
}

#[tokio::test]
async fn image_tool_call_produces_artifact_and_follow_up() {
    let h = harness(ScriptedLlm::replying(vec![
        tool_call("generate_image", json!({"prompt": "a red fox"})),
        text("Here is your fox."),
    ]));
    let mut transcript = Transcript::new();

    let outcome = h
        .processor
        .process(&mut transcript, &InboundTurn::new("Sam", "Draw a red fox"))
        .await
        .unwrap();

    assert_eq!(outcome.reply, "Here is your fox.");
    assert_eq!(outcome.artifacts.len(), 1);
    let artifact = &outcome.artifacts[0];
    assert_eq!(artifact.kind, ArtifactKind::Image);
    assert!(artifact.file_name().ends_with(".png"));
    assert_eq!(std::fs::read(&artifact.path).unwrap(), PNG_BYTES);

    let image_requests = h.media.image_requests.lock().unwrap().clone();
    assert_eq!(image_requests.len(), 1);
    assert_eq!(image_requests[0].prompt, "a red fox");
    assert_eq!(image_requests[0].style, ImageStyle::Vivid);
    assert_eq!(
        h.media.downloads.lock().unwrap().as_slice(),
        ["https://images.example/fox.png"]
    );

    let note = format!(
        "The file has been created and is attached to your reply: {}",
        artifact.file_name()
    );
    let log = entries(&transcript);
    assert!(log.contains(&(Role::System, note)));
    assert_eq!(
        log.last(),
        Some(&(Role::Assistant, "Here is your fox.".to_string()))
    );

    let requests = h.llm.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].tools.is_empty());
}

#[tokio::test]
async fn speech_tool_passes_text_and_voice() {
    let h = harness(ScriptedLlm::replying(vec![
        tool_call("text_to_speech", json!({"text": "Good morning", "voice": "onyx"})),
        text("Have a listen."),
    ]));
    let mut transcript = Transcript::new();

    let outcome = h
        .processor
        .process(&mut transcript, &InboundTurn::new("Sam", "Say good morning"))
        .await
        .unwrap();

    assert_eq!(
        h.media.speech_requests.lock().unwrap().as_slice(),
        [SpeechRequest {
            input: "Good morning".to_string(),
            voice: Voice::Onyx,
        }]
    );
    assert_eq!(outcome.reply, "Have a listen.");
    assert_eq!(outcome.artifacts.len(), 1);
    let artifact = &outcome.artifacts[0];
    assert_eq!(artifact.kind, ArtifactKind::Audio);
    assert!(artifact.file_name().ends_with(".mp3"));
    assert_eq!(std::fs::read(&artifact.path).unwrap(), b"ID3");
    assert!(entries(&transcript).contains(&(
        Role::System,
        format!(
            "The file has been created and is attached to your reply: {}",
            artifact.file_name()
        )
    )));
}

#[tokio::test]
async fn text_file_tool_writes_document() {
    let h = harness(ScriptedLlm::replying(vec![
        tool_call(
            "create_text_file",
            json!({"content": "fn main() {}\n", "extension": "rs"}),
        ),
        text("Saved it."),
    ]));
    let mut transcript = Transcript::new();

    let outcome = h
        .processor
        .process(&mut transcript, &InboundTurn::new("Sam", "Write a main"))
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 1);
    let artifact = &outcome.artifacts[0];
    assert_eq!(artifact.kind, ArtifactKind::Document);
    assert!(artifact.file_name().ends_with(".rs"));
    assert_eq!(std::fs::read_to_string(&artifact.path).unwrap(), "fn main() {}\n");
    assert!(entries(&transcript).contains(&(
        Role::System,
        format!(
            "The file has been created and is attached to your reply: {}",
            artifact.file_name()
        )
    )));
    assert!(h.media.image_requests.lock().unwrap().is_empty());
    assert!(h.media.speech_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn follow_up_query_respects_history_limit() {
    let h = harness_with(
        ScriptedLlm::replying(vec![
            tool_call("generate_image", json!({"prompt": "a red fox"})),
            text("Here is your fox."),
        ]),
        TurnSettings {
            max_history: 3,
            ..settings()
        },
    );
    let mut transcript = Transcript::new();
    transcript.push_user("earlier question");
    transcript.push_assistant("earlier answer");

    h.processor
        .process(&mut transcript, &InboundTurn::new("Sam", "Draw a red fox"))
        .await
        .unwrap();

    let requests = h.llm.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.messages.len() <= 3));
    assert!(requests[1].messages[2]
        .content
        .as_text()
        .starts_with("The file has been created"));
    assert!(transcript.len() <= 3);
}

#[tokio::test]
async fn long_reply_is_segmented() {
    let long = "a".repeat(4500);
    let h = harness(ScriptedLlm::replying(vec![text(&long)]));
    let mut transcript = Transcript::new();

    let outcome = h
        .processor
        .process(&mut transcript, &InboundTurn::new("Sam", "Talk a lot"))
        .await
        .unwrap();

    let lens: Vec<usize> = outcome.segments().iter().map(|s| s.chars().count()).collect();
    assert_eq!(lens, vec![2000, 2000, 500]);
    assert_eq!(outcome.segments().concat(), long);
}

#[tokio::test]
async fn unknown_tool_is_recorded_and_turn_continues() {
    let h = harness(ScriptedLlm::replying(vec![
        tool_call("launch_rocket", json!({})),
        text("I can't do that."),
    ]));
    let mut transcript = Transcript::new();

    let outcome = h
        .processor
        .process(&mut transcript, &InboundTurn::new("Sam", "Launch it"))
        .await
        .unwrap();

    assert_eq!(outcome.reply, "I can't do that.");
    assert!(outcome.artifacts.is_empty());
    assert_eq!(outcome.tool_failures.len(), 1);
    assert!(matches!(
        outcome.tool_failures[0],
        ToolError::UnknownTool { ref name } if name == "launch_rocket"
    ));
    assert!(entries(&transcript).contains(&(
        Role::System,
        "The tool call 'launch_rocket' failed: unknown tool 'launch_rocket'".to_string()
    )));
    assert!(h.media.image_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn text_attachment_precedes_user_entry() {
    let h = harness(ScriptedLlm::replying(vec![text("Nice notes.")]));
    let mut transcript = Transcript::new();
    let inbound = InboundTurn::new("Sam", "What do you think?").with_attachments(vec![
        InboundAttachment::from_bytes("notes.md", b"# Plan\n- ship it".to_vec()),
        InboundAttachment::from_bytes("archive.zip", vec![0, 1, 2]),
    ]);

    h.processor.process(&mut transcript, &inbound).await.unwrap();

    let log = entries(&transcript);
    assert_eq!(log.len(), 4);
    assert_eq!(
        log[1],
        (
            Role::System,
            "The user attached the file 'notes.md':\n# Plan\n- ship it".to_string()
        )
    );
    assert_eq!(log[2], (Role::User, "What do you think?".to_string()));
}

#[tokio::test]
async fn image_attachment_is_described_by_vision_query() {
    let h = harness(ScriptedLlm::replying(vec![
        text("A grey cat on a sofa."),
        text("Cute cat!"),
    ]));
    let mut transcript = Transcript::new();
    let inbound = InboundTurn::new("Sam", "Look").with_attachments(vec![
        InboundAttachment::from_url("cat.PNG", "https://cdn.example/cat.png"),
    ]);

    let outcome = h.processor.process(&mut transcript, &inbound).await.unwrap();
    assert_eq!(outcome.reply, "Cute cat!");

    let requests = h.llm.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].model, "vision-model");
    assert_eq!(requests[0].messages.len(), 1);
    assert!(requests[0].tools.is_empty());

    assert!(entries(&transcript).contains(&(
        Role::System,
        "The user attached the image 'cat.PNG'. Description: A grey cat on a sofa.".to_string()
    )));
}

#[tokio::test]
async fn provider_failure_aborts_turn_without_reply() {
    let h = harness(ScriptedLlm::failing(ProviderError::Unauthorized(
        "invalid key".into(),
    )));
    let mut transcript = Transcript::new();

    let err = h
        .processor
        .process(&mut transcript, &InboundTurn::new("Sam", "Hello"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(transcript.by_role(Role::Assistant).next().is_none());
}

#[tokio::test]
async fn history_is_trimmed_to_limit() {
    let llm = ScriptedLlm::replying((0..10).map(|i| text(&format!("reply {i}"))).collect());
    let h = harness(llm);
    let mut transcript = Transcript::new();

    for i in 0..10 {
        h.processor
            .process(&mut transcript, &InboundTurn::new("Sam", format!("msg {i}")))
            .await
            .unwrap();
        assert!(transcript.len() <= 20);
    }
    assert_eq!(
        transcript.last().map(|m| m.content.as_text()),
        Some("reply 9".to_string())
    );
}

struct TestApp {
    processor: TurnProcessor,
    sessions: SessionRegistry,
}

impl TurnContext for TestApp {
    fn processor(&self) -> &TurnProcessor {
        &self.processor
    }

    fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }
}

#[tokio::test]
async fn conversations_are_isolated_and_resettable() {
    let h = harness(ScriptedLlm::replying(vec![text("one"), text("two")]));
    let app = TestApp {
        processor: h.processor,
        sessions: SessionRegistry::new(std::time::Duration::from_secs(60), 8),
    };
    let a = ConversationKey::for_channel(1);
    let b = ConversationKey::for_channel(2);

    handle_turn(&app.sessions, &a, &app.processor, &InboundTurn::new("Sam", "hi"))
        .await
        .unwrap();
    handle_turn(&app.sessions, &b, &app.processor, &InboundTurn::new("Kim", "yo"))
        .await
        .unwrap();

    let a_len = app.sessions.get(&a).unwrap().lock().await.len();
    let b_len = app.sessions.get(&b).unwrap().lock().await.len();
    assert_eq!((a_len, b_len), (3, 3));

    let reply = handle_command("/reset", &app, &a).await.unwrap();
    assert!(reply.contains("cleared"));
    assert!(app.sessions.get(&a).is_none());
    assert!(app.sessions.get(&b).is_some());

    assert!(handle_command("hello there", &app, &a).await.is_none());
}

#[tokio::test]
async fn model_command_switches_chat_model() {
    let h = harness(ScriptedLlm::replying(vec![text("ok")]));
    let llm = h.llm.clone();
    let app = TestApp {
        processor: h.processor,
        sessions: SessionRegistry::new(std::time::Duration::from_secs(60), 8),
    };
    let key = ConversationKey::global();

    let reply = handle_command("/model gpt-4o-mini", &app, &key).await.unwrap();
    assert!(reply.contains("chat-model"));
    assert!(reply.contains("gpt-4o-mini"));

    handle_turn(&app.sessions, &key, &app.processor, &InboundTurn::new("Sam", "hi"))
        .await
        .unwrap();
    assert_eq!(llm.requests()[0].model, "gpt-4o-mini");
}

#[tokio::test]
async fn turns_of_one_conversation_keep_arrival_order() {
    let h = harness(ScriptedLlm::replying(vec![text("first"), text("second")]));
    let processor = Arc::new(h.processor);
    let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(60), 8));
    let key = ConversationKey::for_channel(7);

    // A arrives first and holds its place while its attachments load.
    let lease_a = begin_turn(&sessions, &key).await;

    let turn_b = {
        let (processor, sessions, key) = (processor.clone(), sessions.clone(), key.clone());
        tokio::spawn(async move {
            handle_turn(&sessions, &key, &processor, &InboundTurn::new("Kim", "B")).await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!turn_b.is_finished());

    let a = lease_a
        .run(&processor, &InboundTurn::new("Sam", "A"))
        .await
        .unwrap();
    let b = turn_b.await.unwrap().unwrap();
    assert_eq!((a.reply.as_str(), b.reply.as_str()), ("first", "second"));

    let users: Vec<String> = sessions
        .get(&key)
        .unwrap()
        .lock()
        .await
        .by_role(Role::User)
        .map(|m| m.content.as_text())
        .collect();
    assert_eq!(users, ["A", "B"]);
}
