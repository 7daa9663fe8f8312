use super::ids::ConversationId;

/// A fetch the user can re-trigger from a failure notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryAction {
    LoadConversations,
    LoadMessages { conversation_id: ConversationId },
    LoadUsers {
        query: Option<String>,
        exclude_current: bool,
    },
}

/// Transient, dismissible failure notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub text: String,
    pub retry: Option<RetryAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoticeBoard {
    notices: Vec<Notice>,
    next_id: u64,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self {
            notices: Vec::new(),
            next_id: 1,
        }
    }
}

impl NoticeBoard {
    pub fn push(&mut self, text: impl Into<String>, retry: Option<RetryAction>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.notices.push(Notice {
            id,
            text: text.into(),
            retry,
        });
        id
    }

    pub fn dismiss(&mut self, id: u64) -> Option<Notice> {
        let index = self.notices.iter().position(|notice| notice.id == id)?;
        Some(self.notices.remove(index))
    }

    pub fn active(&self) -> &[Notice] {
        &self.notices
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.notices.last()
    }
}
