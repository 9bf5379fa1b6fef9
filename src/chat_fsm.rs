use rust_fsm::*;

state_machine! {
    chat_flow(NeedsSelection)

    NeedsSelection(HydrateReady) => Ready,
    NeedsSelection(HydrateSending) => Sending,
    NeedsSelection(HydrateAwaiting) => AwaitingRecommendations,
    NeedsSelection(HydrateSelected) => RecommendationSelected,

    NeedsSelection(Open) => Ready,
    NeedsSelection(Close) => NeedsSelection,

    Ready(Open) => Ready,
    Ready(Close) => NeedsSelection,
    Ready(Send) => Sending,
    Ready(Request) => AwaitingRecommendations,
    Ready(Pick) => RecommendationSelected,

    Sending(Sent) => Ready,
    Sending(Request) => AwaitingRecommendations,
    Sending(Fail) => Ready,
    Sending(Open) => Ready,
    Sending(Close) => NeedsSelection,

    AwaitingRecommendations(Received) => Ready,
    AwaitingRecommendations(Fail) => Ready,
    AwaitingRecommendations(Open) => Ready,
    AwaitingRecommendations(Close) => NeedsSelection,

    RecommendationSelected(Settled) => Ready,
    RecommendationSelected(Open) => Ready,
    RecommendationSelected(Close) => NeedsSelection
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    NeedsSelection,
    Ready,
    Sending,
    AwaitingRecommendations,
    RecommendationSelected,
}

impl ChatPhase {
    /// True while a backend call for the conversation is outstanding.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            ChatPhase::Sending
                | ChatPhase::AwaitingRecommendations
                | ChatPhase::RecommendationSelected
        )
    }

    pub fn shows_loading(self) -> bool {
        matches!(
            self,
            ChatPhase::AwaitingRecommendations | ChatPhase::RecommendationSelected
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    /// Creator and fan chosen, history (re)loaded.
    Open,
    /// Creator or fan deselected.
    Close,
    Send,
    Sent,
    RequestRecommendations,
    RecommendationsReceived,
    Failed,
    Pick,
    Settled,
}

fn hydrate(machine: &mut chat_flow::StateMachine, phase: ChatPhase) -> Option<()> {
    let input = match phase {
        ChatPhase::NeedsSelection => return Some(()),
        ChatPhase::Ready => chat_flow::Input::HydrateReady,
        ChatPhase::Sending => chat_flow::Input::HydrateSending,
        ChatPhase::AwaitingRecommendations => chat_flow::Input::HydrateAwaiting,
        ChatPhase::RecommendationSelected => chat_flow::Input::HydrateSelected,
    };
    machine.consume(&input).ok()?;
    Some(())
}

fn phase_of(state: &chat_flow::State) -> ChatPhase {
    match state {
        chat_flow::State::NeedsSelection => ChatPhase::NeedsSelection,
        chat_flow::State::Ready => ChatPhase::Ready,
        chat_flow::State::Sending => ChatPhase::Sending,
        chat_flow::State::AwaitingRecommendations => ChatPhase::AwaitingRecommendations,
        chat_flow::State::RecommendationSelected => ChatPhase::RecommendationSelected,
    }
}

/// Next phase, or `None` when `action` is not allowed from `current`.
pub fn transition(current: ChatPhase, action: ChatAction) -> Option<ChatPhase> {
    let mut machine = chat_flow::StateMachine::new();
    hydrate(&mut machine, current)?;

    let input = match action {
        ChatAction::Open => chat_flow::Input::Open,
        ChatAction::Close => chat_flow::Input::Close,
        ChatAction::Send => chat_flow::Input::Send,
        ChatAction::Sent => chat_flow::Input::Sent,
        ChatAction::RequestRecommendations => chat_flow::Input::Request,
        ChatAction::RecommendationsReceived => chat_flow::Input::Received,
        ChatAction::Failed => chat_flow::Input::Fail,
        ChatAction::Pick => chat_flow::Input::Pick,
        ChatAction::Settled => chat_flow::Input::Settled,
    };

    machine.consume(&input).ok()?;
    Some(phase_of(machine.state()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_then_recommend_then_pick() {
        let mut phase = ChatPhase::NeedsSelection;
        for (action, expected) in [
            (ChatAction::Open, ChatPhase::Ready),
            (ChatAction::Send, ChatPhase::Sending),
            (ChatAction::RequestRecommendations, ChatPhase::AwaitingRecommendations),
            (ChatAction::RecommendationsReceived, ChatPhase::Ready),
            (ChatAction::Pick, ChatPhase::RecommendationSelected),
            (ChatAction::Settled, ChatPhase::Ready),
        ] {
            phase = transition(phase, action).unwrap();
            assert_eq!(phase, expected);
        }
    }

    #[test]
    fn failures_return_to_ready() {
        assert_eq!(
            transition(ChatPhase::Sending, ChatAction::Failed),
            Some(ChatPhase::Ready)
        );
        assert_eq!(
            transition(ChatPhase::AwaitingRecommendations, ChatAction::Failed),
            Some(ChatPhase::Ready)
        );
    }

    #[test]
    fn rejects_actions_without_selection_or_out_of_order() {
        assert_eq!(transition(ChatPhase::NeedsSelection, ChatAction::Send), None);
        assert_eq!(transition(ChatPhase::NeedsSelection, ChatAction::Pick), None);
        assert_eq!(transition(ChatPhase::Sending, ChatAction::Send), None);
        assert_eq!(transition(ChatPhase::Ready, ChatAction::Settled), None);
        assert_eq!(
            transition(ChatPhase::RecommendationSelected, ChatAction::Pick),
            None
        );
    }

    #[test]
    fn deselecting_always_closes() {
        for phase in [
            ChatPhase::NeedsSelection,
            ChatPhase::Ready,
            ChatPhase::Sending,
            ChatPhase::AwaitingRecommendations,
            ChatPhase::RecommendationSelected,
        ] {
            assert_eq!(
                transition(phase, ChatAction::Close),
                Some(ChatPhase::NeedsSelection)
            );
        }
        assert!(ChatPhase::Sending.is_busy());
        assert!(!ChatPhase::Ready.shows_loading());
    }
}
