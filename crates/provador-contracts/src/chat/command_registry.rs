#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "pose",
        action: "change_pose",
    },
    CommandSpec {
        command: "ask",
        action: "ask",
    },
];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "person",
        action: "set_person",
    },
    CommandSpec {
        command: "clothing",
        action: "set_clothing",
    },
    CommandSpec {
        command: "accessory",
        action: "add_accessory",
    },
    CommandSpec {
        command: "save",
        action: "save_result",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "generate",
        action: "generate",
    },
    CommandSpec {
        command: "poses",
        action: "list_poses",
    },
    CommandSpec {
        command: "describe",
        action: "show_description",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const COMPARE_COMMAND: CommandSpec = CommandSpec {
    command: "compare",
    action: "compare",
};

pub(crate) const DEFAULT_COMPARE_SPLIT: f64 = 0.5;

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/person",
    "/clothing",
    "/generate",
    "/pose",
    "/poses",
    "/accessory",
    "/describe",
    "/ask",
    "/compare",
    "/save",
    "/status",
    "/help",
    "/quit",
];
