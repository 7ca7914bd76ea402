use std::str::FromStr;

/// Target platform, selected by the `Architecture` field of the project
/// file. Both targets share the x86-64 instruction set; they differ in ABI,
/// symbol mangling and object format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
}

impl Platform {
    pub fn architecture(self) -> &'static str {
        match self {
            Platform::Windows => "x86_64-intel-win",
            Platform::MacOs => "x86_64-intel-mac",
        }
    }

    /// `nasm -f` argument for this target.
    pub fn object_format(self) -> &'static str {
        match self {
            Platform::Windows => "elf64",
            Platform::MacOs => "macho64",
        }
    }
}

impl FromStr for Platform {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x86_64-intel-win" => Ok(Platform::Windows),
            "x86_64-intel-mac" => Ok(Platform::MacOs),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.architecture())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn architecture_strings_round_trip() {
        for platform in [Platform::Windows, Platform::MacOs] {
            assert_eq!(platform.architecture().parse(), Ok(platform));
        }
        assert_eq!("x86_64-intel-linux".parse::<Platform>(), Err(()));
    }
}
