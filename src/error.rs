#[derive(Debug)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

pub fn invalid_invocation_error() -> Error {
    Error {
        code: 100,
        message: "invalid invocation".into(),
    }
}

pub fn invalid_input_error() -> Error {
    Error {
        code: 101,
        message: "invalid input".into(),
    }
}

pub fn validation_error(message: &str) -> Error {
    Error {
        code: 102,
        message: message.into(),
    }
}

pub fn auth_error(message: &str) -> Error {
    Error {
        code: 103,
        message: message.into(),
    }
}

pub fn unauthorized_error() -> Error {
    Error {
        code: 104,
        message: "unauthorized".into(),
    }
}
