use anyhow::Result;

use crate::{
    api::ApiTransport,
    cli::{Cli, Command},
    domain::{
        conversation::Conversation,
        ids::{ConversationId, UserId},
        message::DeliveryState,
        open_conversation_state::MessageEntry,
        user::User,
    },
    usecases::{
        bootstrap,
        session::{DirectConversation, MessagingSession},
    },
};

pub fn run(cli: Cli) -> Result<()> {
    let context = bootstrap::bootstrap(cli.config.as_deref())?;
    let mut session = bootstrap::compose_session(&context)?;

    tracing::debug!(
        user_id = %session.current_user(),
        base_url = %context.config.api.base_url,
        "session ready"
    );

    for line in execute(&mut session, cli.command_or_default())? {
        println!("{line}");
    }

    Ok(())
}

/// Runs one command against the session and renders its output lines.
pub fn execute<T: ApiTransport>(
    session: &mut MessagingSession<T>,
    command: Command,
) -> Result<Vec<String>> {
    let lines = match command {
        Command::Conversations { refresh } => {
            session.load_conversations(!refresh)?;
            let me = session.current_user().clone();
            let conversations = session.store().conversations().conversations();
            if conversations.is_empty() {
                vec!["No conversations yet.".to_owned()]
            } else {
                conversations
                    .iter()
                    .map(|conversation| conversation_line(conversation, &me))
                    .collect()
            }
        }
        Command::Messages {
            conversation_id,
            older_pages,
        } => {
            session.select_conversation(&ConversationId::from(conversation_id))?;
            for _ in 0..older_pages {
                if !session.load_older()? {
                    break;
                }
            }
            message_lines(session.store().open().entries())
        }
        Command::Send {
            conversation_id,
            text,
        } => {
            let conversation_id = ConversationId::from(conversation_id);
            session.select_conversation(&conversation_id)?;
            let sent = session.send_message(&conversation_id, &text)?;
            vec![format!("Sent {} to {}", sent.id, sent.conversation_id)]
        }
        Command::Dm { user_id } => {
            let line = match session.start_direct_conversation(&UserId::from(user_id))? {
                DirectConversation::Existing(id) => format!("Opened existing conversation {id}"),
                DirectConversation::Created(id) => format!("Created conversation {id}"),
                DirectConversation::Refused => {
                    "Cannot start a conversation with yourself.".to_owned()
                }
            };
            let mut lines = vec![line];
            lines.extend(message_lines(session.store().open().entries()));
            lines
        }
        Command::Users { search } => {
            let users = session.search_users(search.as_deref())?;
            if users.is_empty() {
                vec!["No users found.".to_owned()]
            } else {
                users.iter().map(user_line).collect()
            }
        }
    };

    Ok(lines)
}

fn conversation_line(conversation: &Conversation, current_user: &UserId) -> String {
    let unread = if conversation.unread_count > 0 {
        format!(" ({} unread)", conversation.unread_count)
    } else {
        String::new()
    };
    let preview = conversation
        .last_message
        .as_ref()
        .map(|message| {
            if message.is_deleted {
                "message deleted".to_owned()
            } else {
                message.display_content()
            }
        })
        .unwrap_or_default();

    format!(
        "{}  {}{}  {}",
        conversation.id,
        conversation.display_title(current_user),
        unread,
        preview
    )
    .trim_end()
    .to_owned()
}

fn message_lines(entries: &[MessageEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let status = match &entry.delivery {
                DeliveryState::Confirmed => String::new(),
                DeliveryState::Pending => " [sending]".to_owned(),
                DeliveryState::Failed { reason } => format!(" [failed: {reason}]"),
            };
            let pin = if entry.message.is_pinned { "* " } else { "" };
            format!(
                "{} {}{}: {}{}",
                entry.message.sent_at.format("%Y-%m-%d %H:%M"),
                pin,
                entry.message.sender_id,
                entry.message.display_content(),
                status
            )
        })
        .collect()
}

fn user_line(user: &User) -> String {
    match &user.email {
        Some(email) => format!("{}  {} <{}>", user.id, user.name, email),
        None => format!("{}  {}", user.id, user.name),
    }
}
