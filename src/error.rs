use std::{error, fmt};

/**
An error surfaced from an export call.

Encoding itself is infallible by construction; values of this type come from
the transport, or from validating caller input like identifier text.
*/
pub struct Error(Box<dyn error::Error + Send + Sync>);

impl Error {
    pub fn new(e: impl error::Error + Send + Sync + 'static) -> Self {
        Error(Box::new(e))
    }

    pub fn msg(msg: impl fmt::Display) -> Self {
        Error(msg.to_string().into())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.0.source()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
