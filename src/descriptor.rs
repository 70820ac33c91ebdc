use std::str::FromStr;

use anyhow::Result;
use jdescriptor::MethodDescriptor;

/// Count the declared parameters of a JVM method descriptor.
pub fn method_param_count(descriptor: &str) -> Result<usize> {
    let parsed = MethodDescriptor::from_str(descriptor)
        .map_err(|_| anyhow::anyhow!("invalid method descriptor {descriptor}"))?;
    Ok(parsed.parameter_types().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_reference_and_primitive_parameters() {
        assert_eq!(
            1,
            method_param_count("(Ljava/lang/Class;)Ljava/lang/annotation/Annotation;")
                .expect("descriptor")
        );
        assert_eq!(0, method_param_count("()V").expect("descriptor"));
        assert_eq!(
            4,
            method_param_count("(IJ[Ljava/lang/String;[[Z)V").expect("descriptor")
        );
    }

    #[test]
    fn rejects_malformed_descriptors() {
        assert!(method_param_count("V").is_err());
        assert!(method_param_count("(Q)V").is_err());
    }
}
