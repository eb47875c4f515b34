//! Session-wide game state.

use pitlane_core::atomic_repr;

/// Phase of the racing session.
///
/// ```text
/// Uninitialized ─► Loading ─► MainMenu ◄─► RaceSetup ─► Racing ◄─► Paused
///                                ▲                        │
///                                └──── RaceFinished ◄─────┘
///                         (any) ─► Exiting ─► Uninitialized
/// ```
///
/// The engine does not police transitions. Any state may follow any other;
/// subsystems decide what to do in each.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GameState {
    /// Before `initialize` or after `shutdown`.
    #[default]
    Uninitialized,
    /// Assets and subsystems coming up.
    Loading,
    /// Front-end menus.
    MainMenu,
    /// Track, car and opponent selection.
    RaceSetup,
    /// Race in progress.
    Racing,
    /// Race suspended.
    Paused,
    /// Results screen.
    RaceFinished,
    /// Shutdown in progress.
    Exiting,
}

atomic_repr!(GameState {
    Uninitialized,
    Loading,
    MainMenu,
    RaceSetup,
    Racing,
    Paused,
    RaceFinished,
    Exiting,
});

impl GameState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Uninitialized,
        Self::Loading,
        Self::MainMenu,
        Self::RaceSetup,
        Self::Racing,
        Self::Paused,
        Self::RaceFinished,
        Self::Exiting,
    ];
}
