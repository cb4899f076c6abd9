//! Interactive menu: greets the user and dispatches numbered choices to Graph.

use std::io::{BufRead, Write};
use std::ops::ControlFlow;

use tracing::{debug, info};

use crate::error::{ApiError, AppError};
use crate::graph::GraphApi;

const MENU: &str = "Please choose one of the following options:
0. Exit
1. Display access token
2. List my inbox
3. Send mail
4. Make a Graph call";

const TEST_MAIL_SUBJECT: &str = "Testing Microsoft Graph";
const TEST_MAIL_BODY: &str = "Hello world!";

/// A parsed menu selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Exit,
    DisplayAccessToken,
    ListInbox,
    SendMail,
    MakeGraphCall,
    Invalid,
}

impl MenuChoice {
    /// Parse one line of input. Anything that is not a listed number is `Invalid`.
    pub fn parse(input: &str) -> Self {
        match input.trim().parse::<i64>() {
            Ok(0) => Self::Exit,
            Ok(1) => Self::DisplayAccessToken,
            Ok(2) => Self::ListInbox,
            Ok(3) => Self::SendMail,
            Ok(4) => Self::MakeGraphCall,
            _ => Self::Invalid,
        }
    }
}

/// Print a greeting for the signed-in user.
pub async fn greet_user<G: GraphApi, W: Write>(graph: &G, out: &mut W) -> Result<(), AppError> {
    if let Some(user) = graph.get_user().await? {
        writeln!(out, "Hello, {}", user.display_name.as_deref().unwrap_or_default())?;
        writeln!(out, "Email: {}\n", user.email().unwrap_or_default())?;
    }
    Ok(())
}

/// Run the menu until the user exits or input ends.
///
/// Graph API errors are printed and the loop continues; any other error is returned.
pub async fn run<G, R, W>(graph: &G, input: &mut R, out: &mut W) -> Result<(), AppError>
where
    G: GraphApi,
    R: BufRead,
    W: Write,
{
    loop {
        writeln!(out, "{}", MENU)?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            info!("Input closed, leaving menu");
            return Ok(());
        }

        let choice = MenuChoice::parse(&line);
        debug!("Menu choice: {:?}", choice);

        match dispatch(graph, choice, out).await {
            Ok(ControlFlow::Break(())) => return Ok(()),
            Ok(ControlFlow::Continue(())) => {}
            Err(AppError::Api(e)) => print_api_error(out, &e)?,
            Err(e) => return Err(e),
        }
    }
}

async fn dispatch<G: GraphApi, W: Write>(
    graph: &G,
    choice: MenuChoice,
    out: &mut W,
) -> Result<ControlFlow<()>, AppError> {
    match choice {
        MenuChoice::Exit => {
            writeln!(out, "Goodbye...")?;
            return Ok(ControlFlow::Break(()));
        }
        MenuChoice::DisplayAccessToken => display_access_token(graph, out).await?,
        MenuChoice::ListInbox => list_inbox(graph, out).await?,
        MenuChoice::SendMail => send_mail(graph, out).await?,
        MenuChoice::MakeGraphCall => graph.make_graph_call().await?,
        MenuChoice::Invalid => writeln!(out, "Invalid choice!\n")?,
    }
    Ok(ControlFlow::Continue(()))
}

async fn display_access_token<G: GraphApi, W: Write>(graph: &G, out: &mut W) -> Result<(), AppError> {
    let token = graph.get_user_token().await?;
    writeln!(out, "User token: {}\n", token)?;
    Ok(())
}

async fn list_inbox<G: GraphApi, W: Write>(graph: &G, out: &mut W) -> Result<(), AppError> {
    let page = graph.get_inbox().await?;
    if page.value.is_empty() {
        return Ok(());
    }

    for message in &page.value {
        writeln!(out, "Message: {}", message.subject.as_deref().unwrap_or_default())?;
        writeln!(out, "  From: {}", message.sender_name().unwrap_or("NONE"))?;
        let status = if message.is_read.unwrap_or(false) {
            "Read"
        } else {
            "Unread"
        };
        writeln!(out, "  Status: {}", status)?;
        match message.received_date_time {
            Some(received) => writeln!(out, "  Received: {}", received)?,
            None => writeln!(out, "  Received: NONE")?,
        }
    }

    writeln!(out, "\nMore messages available? {}\n", page.more_available())?;
    Ok(())
}

async fn send_mail<G: GraphApi, W: Write>(graph: &G, out: &mut W) -> Result<(), AppError> {
    // Send the test message to the signed-in user
    if let Some(user) = graph.get_user().await? {
        let recipient = user.email().unwrap_or_default();
        graph
            .send_mail(TEST_MAIL_SUBJECT, TEST_MAIL_BODY, recipient)
            .await?;
        writeln!(out, "Mail sent.\n")?;
    }
    Ok(())
}

fn print_api_error<W: Write>(out: &mut W, error: &ApiError) -> Result<(), AppError> {
    writeln!(out, "Error:")?;
    match error {
        ApiError::Graph(graph_error) => {
            if let Some(detail) = &graph_error.error {
                writeln!(out, "{}", detail.summary())?;
            }
        }
        ApiError::ParseFailed(reason) => writeln!(out, "{}", reason)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GraphError, GraphErrorDetail};
    use crate::graph::models::{EmailAddress, Message, MessagePage, Recipient, User};
    use std::cell::RefCell;
    use std::io::Cursor;

    /// Records every call and answers with canned data.
    #[derive(Default)]
    struct FakeGraph {
        calls: RefCell<Vec<String>>,
        user: Option<User>,
        messages: Vec<Message>,
        next_link: Option<String>,
        inbox_error: Option<(String, String)>,
    }

    impl FakeGraph {
        fn with_user(mail: Option<&str>, upn: &str) -> Self {
            Self {
                user: Some(User {
                    display_name: Some("Adele Vance".into()),
                    mail: mail.map(str::to_string),
                    user_principal_name: Some(upn.to_string()),
                }),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.borrow_mut().push(call.into());
        }
    }

    impl GraphApi for FakeGraph {
        async fn get_user_token(&self) -> Result<String, AppError> {
            self.record("get_user_token");
            Ok("eyJ0eXAiOiJKV1Qi".into())
        }

        async fn get_user(&self) -> Result<Option<User>, AppError> {
            self.record("get_user");
            Ok(self.user.clone())
        }

        async fn get_inbox(&self) -> Result<MessagePage, AppError> {
            self.record("get_inbox");
            if let Some((code, message)) = &self.inbox_error {
                return Err(GraphError {
                    status: 400,
                    error: Some(GraphErrorDetail {
                        code: Some(code.clone()),
                        message: Some(message.clone()),
                    }),
                }
                .into());
            }
            Ok(MessagePage {
                value: self.messages.clone(),
                next_link: self.next_link.clone(),
            })
        }

        async fn send_mail(&self, subject: &str, body: &str, recipient: &str) -> Result<(), AppError> {
            self.record(format!("send_mail({}|{}|{})", subject, body, recipient));
            Ok(())
        }

        async fn make_graph_call(&self) -> Result<(), AppError> {
            self.record("make_graph_call");
            Ok(())
        }
    }

    async fn run_with_input(graph: &FakeGraph, input: &str) -> String {
        let mut input = Cursor::new(input.as_bytes().to_vec());
        let mut out = Vec::new();
        run(graph, &mut input, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_choices() {
        assert_eq!(MenuChoice::parse("0\n"), MenuChoice::Exit);
        assert_eq!(MenuChoice::parse(" 2 "), MenuChoice::ListInbox);
        assert_eq!(MenuChoice::parse("4"), MenuChoice::MakeGraphCall);
        assert_eq!(MenuChoice::parse("5"), MenuChoice::Invalid);
        assert_eq!(MenuChoice::parse("-1"), MenuChoice::Invalid);
    }

    #[tokio::test]
    async fn test_non_integer_input_is_invalid() {
        for input in ["abc\n0\n", "1.5\n0\n", "\n0\n", "two\n0\n"] {
            let graph = FakeGraph::default();
            let output = run_with_input(&graph, input).await;

            assert!(output.contains("Invalid choice!"), "input {:?}", input);
            assert!(graph.calls().is_empty(), "input {:?}", input);
        }
    }

    #[tokio::test]
    async fn test_exit_calls_nothing() {
        let graph = FakeGraph::default();
        let output = run_with_input(&graph, "0\n1\n").await;

        assert!(output.contains("Goodbye..."));
        assert!(graph.calls().is_empty());
        assert_eq!(output.matches("0. Exit").count(), 1);
    }

    #[tokio::test]
    async fn test_end_of_input_leaves_loop() {
        let graph = FakeGraph::default();
        let output = run_with_input(&graph, "").await;

        assert!(output.starts_with("Please choose one of the following options:"));
        assert!(graph.calls().is_empty());
    }

    #[tokio::test]
    async fn test_display_access_token() {
        let graph = FakeGraph::default();
        let output = run_with_input(&graph, "1\n0\n").await;

        assert!(output.contains("User token: eyJ0eXAiOiJKV1Qi"));
        assert_eq!(graph.calls(), vec!["get_user_token"]);
    }

    #[tokio::test]
    async fn test_list_inbox_output() {
        let graph = FakeGraph {
            messages: vec![
                Message {
                    subject: Some("Quarterly review".into()),
                    from: Some(Recipient {
                        email_address: Some(EmailAddress {
                            name: Some("Megan Bowen".into()),
                            address: Some("MeganB@contoso.com".into()),
                        }),
                    }),
                    is_read: Some(false),
                    received_date_time: Some("2024-03-05T16:45:12Z".parse().unwrap()),
                },
                Message {
                    subject: Some("No sender".into()),
                    from: None,
                    is_read: Some(true),
                    received_date_time: None,
                },
            ],
            next_link: Some("https://graph.microsoft.com/v1.0/next".into()),
            ..Default::default()
        };

        let output = run_with_input(&graph, "2\n0\n").await;

        assert!(output.contains(
            "Message: Quarterly review\n  From: Megan Bowen\n  Status: Unread\n  Received: 2024-03-05 16:45:12 UTC\n"
        ));
        assert!(output.contains("Message: No sender\n  From: NONE\n  Status: Read\n"));
        assert!(output.contains("More messages available? true"));
    }

    #[tokio::test]
    async fn test_empty_inbox_prints_nothing() {
        let graph = FakeGraph::default();
        let output = run_with_input(&graph, "2\n0\n").await;

        assert!(!output.contains("More messages available?"));
        assert_eq!(graph.calls(), vec!["get_inbox"]);
    }

    #[tokio::test]
    async fn test_api_error_is_printed_and_loop_continues() {
        let graph = FakeGraph {
            inbox_error: Some(("X".into(), "Y".into())),
            ..Default::default()
        };

        let output = run_with_input(&graph, "2\n1\n0\n").await;

        assert!(output.contains("Error:\nX Y\n"));
        assert!(output.contains("Goodbye..."));
        assert_eq!(graph.calls(), vec!["get_inbox", "get_user_token"]);
    }

    #[tokio::test]
    async fn test_send_mail_falls_back_to_principal_name() {
        let graph = FakeGraph::with_user(Some(""), "a@b.com");
        let output = run_with_input(&graph, "3\n0\n").await;

        assert!(output.contains("Mail sent."));
        assert_eq!(
            graph.calls(),
            vec![
                "get_user",
                "send_mail(Testing Microsoft Graph|Hello world!|a@b.com)"
            ]
        );
    }

    #[tokio::test]
    async fn test_greeting_falls_back_to_principal_name() {
        let graph = FakeGraph::with_user(Some(""), "a@b.com");
        let mut out = Vec::new();
        greet_user(&graph, &mut out).await.unwrap();

        let output = String::from_utf8(out).unwrap();
        assert_eq!(output, "Hello, Adele Vance\nEmail: a@b.com\n\n");
    }

    #[tokio::test]
    async fn test_make_graph_call_is_placeholder() {
        let graph = FakeGraph::default();
        let output = run_with_input(&graph, "4\n0\n").await;

        assert_eq!(graph.calls(), vec!["make_graph_call"]);
        assert!(!output.contains("Error:"));
    }
}
